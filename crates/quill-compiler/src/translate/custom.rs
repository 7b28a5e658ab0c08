//! Compiler-synthesized members of records, unions and delegates.
//!
//! Custom types have no explicitly compiled members; case construction,
//! tag access, field accessors and case tests are emitted from the
//! custom-type descriptor instead.

use quill_ast::{
    known, BinaryOperator, Concrete, Expr, Id, Literal, MethodDef, Purity, Transformer, TypeDef,
    UnaryOperator,
};
use quill_metadata::{
    CustomTypeInfo, ErasedUnionCase, Node, RecordFieldInfo, UnionCaseKind, UnionInfo,
};

use super::Translator;
use crate::runtime::{self, helpers};

impl Translator<'_> {
    /// A method call resolved to a custom-type member.
    pub(super) fn custom_type_call(
        &mut self,
        ct: CustomTypeInfo,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        method: Concrete<MethodDef>,
        args: Vec<Expr>,
    ) -> Expr {
        let name = method.entity.name.clone();
        match ct {
            CustomTypeInfo::Delegate(_) => self.delegate_member(&name, this, &ty, args),
            CustomTypeInfo::Record(_) | CustomTypeInfo::Struct => {
                if let Some(field) = name.strip_prefix("get_") {
                    let field = field.to_string();
                    return self.transform_field_get_entry(this, ty, field);
                }
                if let Some(field) = name.strip_prefix("set_") {
                    let field = field.to_string();
                    let Some(value) = args.into_iter().next() else {
                        return self.source_error(format!(
                            "Setter {}.{} called without a value",
                            ty.entity, name
                        ));
                    };
                    return self.transform_field_set_entry(this, ty, field, value);
                }
                if name == "ToString" {
                    return Expr::str(ty.entity.name.clone());
                }
                self.source_error(format!(
                    "Unsupported member on type {}: {}",
                    ty.entity, name
                ))
            }
            CustomTypeInfo::Union(_) | CustomTypeInfo::ErasedUnion(_) => {
                self.union_member(&name, this, ty, args)
            }
        }
    }

    // field entry points routed through the shared lookup path
    fn transform_field_get_entry(
        &mut self,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        field: String,
    ) -> Expr {
        self.transform_expr(Expr::FieldGet {
            this: this.map(Box::new),
            ty,
            field,
        })
    }

    fn transform_field_set_entry(
        &mut self,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        field: String,
        value: Expr,
    ) -> Expr {
        self.transform_expr(Expr::FieldSet {
            this: this.map(Box::new),
            ty,
            field,
            value: Box::new(value),
        })
    }

    fn delegate_member(
        &mut self,
        name: &str,
        this: Option<Expr>,
        ty: &Concrete<TypeDef>,
        args: Vec<Expr>,
    ) -> Expr {
        match name {
            "Invoke" => {
                let Some(this) = this else {
                    return self.source_error("Delegate invoked without a receiver");
                };
                let this = self.transform_expr(this);
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Expr::Application {
                    target: Box::new(this),
                    args,
                    purity: Purity::NonPure,
                }
            }
            "op_Addition" | "Combine" => {
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Expr::apply(
                    runtime::global(helpers::COMBINE_DELEGATES),
                    vec![Expr::NewArray(args)],
                )
            }
            "op_Equality" => {
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Expr::Application {
                    target: Box::new(runtime::global(helpers::DELEGATE_EQUAL)),
                    args,
                    purity: Purity::Pure,
                }
            }
            "op_Inequality" => {
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Expr::unary(
                    UnaryOperator::Not,
                    Expr::Application {
                        target: Box::new(runtime::global(helpers::DELEGATE_EQUAL)),
                        args,
                        purity: Purity::Pure,
                    },
                )
            }
            "ToString" => Expr::str(ty.entity.name.clone()),
            _ => self.source_error(format!(
                "Unsupported delegate member on {}: {}",
                ty.entity, name
            )),
        }
    }

    fn union_member(
        &mut self,
        name: &str,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        args: Vec<Expr>,
    ) -> Expr {
        if name == "get_Tag" {
            let Some(this) = this else {
                return self.source_error("Tag access without a receiver");
            };
            return self.transform_union_case_tag(this, ty);
        }
        if let Some(case) = name.strip_prefix("get_Is") {
            let Some(this) = this else {
                return self.source_error("Case test without a receiver");
            };
            return self.transform_union_case_test(this, ty, case.to_string());
        }
        if let Some(case) = name.strip_prefix("New") {
            return self.transform_new_union_case(ty, case.to_string(), args);
        }
        if name == "ToString" {
            return Expr::str(ty.entity.name.clone());
        }
        if let Some(case) = name.strip_prefix("get_") {
            // nullary case access: the singleton instance or constant
            return self.nullary_union_case(ty, case.to_string());
        }
        self.source_error(format!(
            "Union case not found on {}: {}",
            ty.entity, name
        ))
    }

    fn nullary_union_case(&mut self, ty: Concrete<TypeDef>, case: String) -> Expr {
        match self.comp.get_custom_type(&ty.entity) {
            Some(CustomTypeInfo::Union(u)) => {
                let Some(idx) = u.case_index(&case) else {
                    return self.source_error(format!(
                        "Union case not found on {}: {}",
                        ty.entity, case
                    ));
                };
                match &u.cases[idx].kind {
                    UnionCaseKind::Constant(l) => Expr::Value(l.clone()),
                    UnionCaseKind::Singleton => self.singleton_instance(&ty.entity, &case),
                    UnionCaseKind::Normal(_) => self.source_error(format!(
                        "Union case {} of {} takes arguments",
                        case, ty.entity
                    )),
                }
            }
            _ => self.source_error(format!(
                "Union case not found on {}: {}",
                ty.entity, case
            )),
        }
    }

    /// The shared instance of a singleton case, stored on the union's
    /// address under the case name.
    fn singleton_instance(&mut self, ty: &TypeDef, case: &str) -> Expr {
        match self.comp.class_address(ty) {
            Some(addr) => Expr::item(Expr::GlobalAccess(addr), case, Purity::Pure),
            None => self.source_error(format!(
                "Singleton union case {}.{} needs a class address",
                ty, case
            )),
        }
    }

    // ------------------------------------------------------------------
    // Union case construction
    // ------------------------------------------------------------------

    pub(crate) fn transform_new_union_case(
        &mut self,
        ty: Concrete<TypeDef>,
        case: String,
        args: Vec<Expr>,
    ) -> Expr {
        self.comp.add_dependency(
            self.current_node.clone(),
            Node::Type(self.resolved_type(&ty.entity)),
        );
        match self.comp.get_custom_type(&ty.entity) {
            Some(CustomTypeInfo::Union(u)) => {
                let Some(idx) = u.case_index(&case) else {
                    return self.source_error(format!(
                        "Union case not found on {}: {}",
                        ty.entity, case
                    ));
                };
                match &u.cases[idx].kind {
                    UnionCaseKind::Constant(l) => Expr::Value(l.clone()),
                    UnionCaseKind::Singleton => self.singleton_instance(&ty.entity, &case),
                    UnionCaseKind::Normal(fields) => {
                        let field_count = fields.len();
                        let mut pairs = Vec::new();
                        if u.has_tag() {
                            pairs.push(("$".to_string(), Expr::int(idx as i64)));
                        }
                        for (i, a) in args.into_iter().take(field_count).enumerate() {
                            pairs.push((format!("${}", i), self.transform_expr(a)));
                        }
                        let obj = Expr::Object(pairs);
                        let case_ty = union_case_class(&ty.entity, &case);
                        self.transform_copy_ctor(case_ty, obj)
                    }
                }
            }
            Some(CustomTypeInfo::ErasedUnion(_)) => {
                // erased: the case value is the union value
                match args.into_iter().next() {
                    Some(a) => self.transform_expr(a),
                    None => Expr::Undefined,
                }
            }
            _ => self.source_error(format!(
                "Union case not found on {}: {}",
                ty.entity, case
            )),
        }
    }

    /// Recurse into the wrapped object; the writer wires the prototype.
    pub(crate) fn transform_copy_ctor(&mut self, ty: TypeDef, object: Expr) -> Expr {
        self.comp.add_dependency(
            self.current_node.clone(),
            Node::Type(self.resolved_type(&ty)),
        );
        let object = self.transform_expr(object);
        Expr::CopyCtor {
            ty,
            object: Box::new(object),
        }
    }

    // ------------------------------------------------------------------
    // Union case tests, tags and field access
    // ------------------------------------------------------------------

    pub(crate) fn transform_union_case_test(
        &mut self,
        expr: Expr,
        ty: Concrete<TypeDef>,
        case: String,
    ) -> Expr {
        match self.comp.get_custom_type(&ty.entity) {
            Some(CustomTypeInfo::Union(u)) => {
                let Some(idx) = u.case_index(&case) else {
                    return self.source_error(format!(
                        "Union case not found on {}: {}",
                        ty.entity, case
                    ));
                };
                let e = self.transform_expr(expr);
                if u.is_single_case() {
                    return Expr::Sequential(vec![e, Expr::bool(true)]);
                }
                if let Some((null_at, _)) = u.null_pair() {
                    let op = if idx == null_at {
                        BinaryOperator::StrictEq
                    } else {
                        BinaryOperator::StrictNotEq
                    };
                    return Expr::binary(e, op, Expr::Value(Literal::Null));
                }
                match &u.cases[idx].kind {
                    UnionCaseKind::Constant(l) => {
                        Expr::binary(e, BinaryOperator::StrictEq, Expr::Value(l.clone()))
                    }
                    _ => Expr::binary(
                        Expr::item(e, "$", Purity::Pure),
                        BinaryOperator::Eq,
                        Expr::int(idx as i64),
                    ),
                }
            }
            Some(CustomTypeInfo::ErasedUnion(cases)) => {
                let Some(c) = cases.iter().find(|c| c.name == case).cloned() else {
                    return self.source_error(format!(
                        "Union case not found on {}: {}",
                        ty.entity, case
                    ));
                };
                if ty.entity == known::optional() && c.name == "None" {
                    let e = self.transform_expr(expr);
                    return Expr::binary(e, BinaryOperator::StrictEq, Expr::Undefined);
                }
                if ty.entity == known::optional() && c.name == "Some" {
                    let e = self.transform_expr(expr);
                    return Expr::binary(e, BinaryOperator::StrictNotEq, Expr::Undefined);
                }
                self.transform_type_check_entry(expr, c)
            }
            _ => self.source_error(format!(
                "Union case not found on {}: {}",
                ty.entity, case
            )),
        }
    }

    fn transform_type_check_entry(&mut self, expr: Expr, case: ErasedUnionCase) -> Expr {
        self.transform_expr(Expr::TypeCheck {
            expr: Box::new(expr),
            ty: case.ty,
        })
    }

    pub(crate) fn transform_union_case_tag(
        &mut self,
        expr: Expr,
        ty: Concrete<TypeDef>,
    ) -> Expr {
        match self.comp.get_custom_type(&ty.entity) {
            Some(CustomTypeInfo::Union(u)) => {
                let e = self.transform_expr(expr);
                if u.is_single_case() {
                    return Expr::Sequential(vec![e, Expr::int(0)]);
                }
                if let Some((null_at, value_at)) = u.null_pair() {
                    return Expr::conditional(
                        Expr::binary(e, BinaryOperator::StrictEq, Expr::Value(Literal::Null)),
                        Expr::int(null_at as i64),
                        Expr::int(value_at as i64),
                    );
                }
                Expr::item(e, "$", Purity::Pure)
            }
            Some(CustomTypeInfo::ErasedUnion(cases)) => self.erased_union_tag(expr, &ty, cases),
            _ => self.source_error(format!("Not a union type: {}", ty.entity)),
        }
    }

    /// The tag of an erased union, reconstructed by sequential type
    /// inspection in declaration order.
    fn erased_union_tag(
        &mut self,
        expr: Expr,
        ty: &Concrete<TypeDef>,
        cases: Vec<ErasedUnionCase>,
    ) -> Expr {
        if ty.entity == known::optional() {
            let e = self.transform_expr(expr);
            return Expr::conditional(
                Expr::binary(e, BinaryOperator::StrictEq, Expr::Undefined),
                Expr::int(0),
                Expr::int(1),
            );
        }
        if cases.is_empty() {
            return self.source_error(format!("Erased union {} has no cases", ty.entity));
        }
        let e = self.transform_expr(expr);
        let needs_binding = e.purity() < Purity::Pure;
        let (subject, bind) = if needs_binding {
            let v = Id::named("x");
            (Expr::Var(v.clone()), Some((v, e)))
        } else {
            (e, None)
        };
        // the last case needs no test of its own
        let mut chain = Expr::int((cases.len() - 1) as i64);
        for (idx, case) in cases.iter().enumerate().rev().skip(1) {
            let test = self.transform_type_check_entry(subject.clone(), case.clone());
            chain = Expr::conditional(test, Expr::int(idx as i64), chain);
        }
        match bind {
            Some((v, e)) => Expr::let_in(v, e, chain),
            None => chain,
        }
    }

    pub(crate) fn transform_union_case_get(
        &mut self,
        expr: Expr,
        ty: Concrete<TypeDef>,
        case: String,
        field: String,
    ) -> Expr {
        match self.comp.get_custom_type(&ty.entity) {
            Some(CustomTypeInfo::Union(u)) => {
                let Some(idx) = u.case_index(&case) else {
                    return self.source_error(format!(
                        "Union case not found on {}: {}",
                        ty.entity, case
                    ));
                };
                match &u.cases[idx].kind {
                    UnionCaseKind::Normal(fields) => {
                        let Some(pos) = fields.iter().position(|f| *f == field) else {
                            return self.source_error(format!(
                                "Union case field not found on {}.{}: {}",
                                ty.entity, case, field
                            ));
                        };
                        let e = self.transform_expr(expr);
                        Expr::item(e, format!("${}", pos), Purity::Pure)
                    }
                    _ => self.source_error(format!(
                        "Union case {} of {} has no fields",
                        case, ty.entity
                    )),
                }
            }
            Some(CustomTypeInfo::ErasedUnion(_)) => {
                // erased: the union value is the case value
                self.transform_expr(expr)
            }
            _ => self.source_error(format!(
                "Union case not found on {}: {}",
                ty.entity, case
            )),
        }
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    pub(crate) fn transform_new_record(&mut self, ty: Concrete<TypeDef>, args: Vec<Expr>) -> Expr {
        self.comp.add_dependency(
            self.current_node.clone(),
            Node::Type(self.resolved_type(&ty.entity)),
        );
        let Some(CustomTypeInfo::Record(fields)) = self.comp.get_custom_type(&ty.entity) else {
            return self.source_error(format!("Not a record type: {}", ty.entity));
        };
        let mut pairs = Vec::new();
        let mut optional_names = Vec::new();
        for (f, a) in fields.iter().zip(args) {
            let value = self.transform_expr(a);
            let value = if f.optional {
                optional_names.push(f.js_name.clone());
                optional_value(value)
            } else {
                value
            };
            pairs.push((f.js_name.clone(), value));
        }
        let obj = Expr::Object(pairs);
        let obj = if optional_names.is_empty() {
            obj
        } else {
            Expr::apply(
                runtime::global(helpers::DELETE_EMPTY_FIELDS),
                vec![
                    obj,
                    Expr::NewArray(optional_names.into_iter().map(Expr::str).collect()),
                ],
            )
        };
        if self.comp.try_lookup_class_info(&ty.entity).is_some() {
            let entity = ty.entity;
            Expr::CopyCtor {
                ty: entity,
                object: Box::new(obj),
            }
        } else {
            obj
        }
    }

    /// A record/union custom-type field access.
    pub(super) fn custom_type_field_get(
        &mut self,
        ct: CustomTypeInfo,
        this: Option<Expr>,
        ty: &Concrete<TypeDef>,
        field: &str,
    ) -> Expr {
        match ct {
            CustomTypeInfo::Record(fields) => {
                let Some(f) = fields.iter().find(|f| f.name == field) else {
                    return self.source_error(format!(
                        "Record field not found on {}: {}",
                        ty.entity, field
                    ));
                };
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Record field {}.{} accessed without a receiver",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                record_field_get(this, f)
            }
            CustomTypeInfo::Union(u) => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Union field {}.{} accessed without a receiver",
                        ty.entity, field
                    ));
                };
                let Some(pos) = union_field_slot(&u, field) else {
                    return self.source_error(format!(
                        "Union case field not found on {}: {}",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                Expr::item(this, format!("${}", pos), Purity::Pure)
            }
            _ => self.source_error(format!(
                "Field not found on {}: {}",
                ty.entity, field
            )),
        }
    }

    pub(super) fn custom_type_field_set(
        &mut self,
        ct: CustomTypeInfo,
        this: Option<Expr>,
        ty: &Concrete<TypeDef>,
        field: &str,
        value: Expr,
    ) -> Expr {
        match ct {
            CustomTypeInfo::Record(fields) => {
                let Some(f) = fields.iter().find(|f| f.name == field) else {
                    return self.source_error(format!(
                        "Record field not found on {}: {}",
                        ty.entity, field
                    ));
                };
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Record field {}.{} assigned without a receiver",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                let value = self.transform_expr(value);
                if f.optional {
                    Expr::apply(
                        runtime::global(helpers::SET_OPTIONAL),
                        vec![this, Expr::str(f.js_name.clone()), value],
                    )
                } else {
                    Expr::ItemSet {
                        target: Box::new(this),
                        item: Box::new(Expr::str(f.js_name.clone())),
                        value: Box::new(value),
                    }
                }
            }
            _ => self.source_error(format!(
                "Field not found on {}: {}",
                ty.entity, field
            )),
        }
    }

    /// A constructor call resolved to a custom type.
    pub(super) fn custom_type_ctor(
        &mut self,
        ct: CustomTypeInfo,
        ty: Concrete<TypeDef>,
        args: Vec<Expr>,
    ) -> Expr {
        match ct {
            CustomTypeInfo::Record(_) => self.transform_new_record(ty, args),
            _ => self.source_error(format!(
                "No constructor is available for {}",
                ty.entity
            )),
        }
    }
}

/// The nested class a union case's prototype is wired to.
fn union_case_class(union: &TypeDef, case: &str) -> TypeDef {
    TypeDef::new(union.assembly.clone(), format!("{}+{}", union.name, case))
}

/// Read a record field, routing optional storage through the runtime.
fn record_field_get(this: Expr, f: &RecordFieldInfo) -> Expr {
    let purity = if f.mutable {
        Purity::NoSideEffect
    } else {
        Purity::Pure
    };
    if f.optional {
        Expr::apply(
            runtime::global(helpers::GET_OPTIONAL),
            vec![Expr::item(this, f.js_name.clone(), Purity::NoSideEffect)],
        )
    } else {
        Expr::item(this, f.js_name.clone(), purity)
    }
}

/// Slot of a named field in any case of the union.
fn union_field_slot(u: &UnionInfo, field: &str) -> Option<usize> {
    for case in &u.cases {
        if let UnionCaseKind::Normal(fields) = &case.kind {
            if let Some(pos) = fields.iter().position(|f| f == field) {
                return Some(pos);
            }
        }
    }
    None
}

/// Wrap an optional record-construction argument: an incoming
/// `undefined` stays `undefined`, a present value is read from its `$0`
/// slot.
fn optional_value(value: Expr) -> Expr {
    if value.purity() == Purity::Pure {
        return Expr::conditional(
            Expr::binary(value.clone(), BinaryOperator::StrictEq, Expr::Undefined),
            Expr::Undefined,
            Expr::item(value, "$0", Purity::Pure),
        );
    }
    let v = Id::named("o");
    Expr::let_in(
        v.clone(),
        value,
        Expr::conditional(
            Expr::binary(
                Expr::Var(v.clone()),
                BinaryOperator::StrictEq,
                Expr::Undefined,
            ),
            Expr::Undefined,
            Expr::item(Expr::Var(v), "$0", Purity::Pure),
        ),
    )
}
