//! The translator.
//!
//! A `Translator` is bound to a single member and rewrites its body from
//! the input IR into the JavaScript IR. Per-invocation state (current
//! graph node, inline flag, self address, delayed-transform marker, the
//! in-progress stack for cycle detection) is carried by value; nested
//! compilations re-borrow the shared database.

mod call;
mod custom;
mod macros;

use quill_ast::{
    known, BinaryOperator, Concrete, Expr, FuncArgOptimization, Id, Literal, MethodDef, Purity,
    Span, Statement, Transformer, Type, TypeDef, UnaryOperator,
};
use quill_metadata::{
    Compilation, CustomTypeInfo, FieldLookup, LookupError, Node, TranslationError,
};
use rustc_hash::FxHashMap;

use crate::driver::CompilerOptions;

/// Rewrites one member body, dispatching on node kinds and metadata.
pub struct Translator<'a> {
    pub(crate) comp: &'a mut Compilation,
    pub(crate) options: &'a CompilerOptions,
    pub(crate) current_node: Node,
    pub(crate) current_is_inline: bool,
    pub(crate) self_address: Option<quill_ast::Address>,
    pub(crate) has_delayed_transform: bool,
    pub(crate) shaped_params: FxHashMap<Id, FuncArgOptimization>,
    pub(crate) in_progress: Vec<Node>,
    pub(crate) current_span: Option<Span>,
}

impl<'a> Translator<'a> {
    pub fn new(comp: &'a mut Compilation, options: &'a CompilerOptions, node: Node) -> Self {
        Self {
            comp,
            options,
            current_node: node,
            current_is_inline: false,
            self_address: None,
            has_delayed_transform: false,
            shaped_params: FxHashMap::default(),
            in_progress: Vec::new(),
            current_span: None,
        }
    }

    pub fn with_inline(mut self, inline: bool) -> Self {
        self.current_is_inline = inline;
        self
    }

    pub fn with_self_address(mut self, address: Option<quill_ast::Address>) -> Self {
        self.self_address = address;
        self
    }

    pub fn with_shaped_params(mut self, shaped: FxHashMap<Id, FuncArgOptimization>) -> Self {
        self.shaped_params = shaped;
        self
    }

    pub fn with_in_progress(mut self, in_progress: Vec<Node>) -> Self {
        self.in_progress = in_progress;
        self
    }

    /// Whether translation left nodes that need per-call-site resolution.
    pub fn has_delayed_transform(&self) -> bool {
        self.has_delayed_transform
    }

    /// Record an error at the current position, yield the placeholder.
    pub(crate) fn error(&mut self, error: TranslationError) -> Expr {
        self.comp.add_error(self.current_span, error);
        Expr::error_placeholder()
    }

    pub(crate) fn source_error(&mut self, message: impl Into<String>) -> Expr {
        self.error(TranslationError::SourceError(message.into()))
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.comp.add_warning(self.current_span, message);
    }

    /// Mark the member this translator is bound to as failed.
    pub(crate) fn fail_current(&mut self) {
        let node = self.current_node.clone();
        self.comp.mark_failed(node);
    }

    pub(crate) fn resolved_type(&self, ty: &TypeDef) -> TypeDef {
        self.comp.find_proxied(ty).unwrap_or_else(|| ty.clone())
    }

    // ------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------

    fn transform_field_get(
        &mut self,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        field: String,
    ) -> Expr {
        self.comp.add_dependency(
            self.current_node.clone(),
            Node::Type(self.resolved_type(&ty.entity)),
        );
        match self.comp.lookup_field(&ty.entity, &field) {
            FieldLookup::Instance { name, readonly } => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Instance field {}.{} accessed without a receiver",
                        ty.entity, field
                    ));
                };
                let purity = if readonly {
                    Purity::Pure
                } else {
                    Purity::NoSideEffect
                };
                let this = self.transform_expr(this);
                Expr::item(this, name, purity)
            }
            FieldLookup::Static(addr) => self.static_field_get(&ty.entity, addr),
            FieldLookup::Optional(name) => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Instance field {}.{} accessed without a receiver",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                Expr::apply(
                    crate::runtime::global(crate::runtime::helpers::GET_OPTIONAL),
                    vec![Expr::item(this, name, Purity::NoSideEffect)],
                )
            }
            FieldLookup::Indexed(i) => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Instance field {}.{} accessed without a receiver",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                Expr::ItemGet {
                    target: Box::new(this),
                    item: Box::new(Expr::int(i as i64)),
                    purity: Purity::NoSideEffect,
                }
            }
            FieldLookup::Property { getter, .. } => match getter {
                Some(g) => self.transform_call(this, ty, Concrete::plain(g), vec![]),
                None => self.source_error(format!(
                    "Property {}.{} has no getter",
                    ty.entity, field
                )),
            },
            FieldLookup::CustomTypeField(ct) => self.custom_type_field_get(ct, this, &ty, &field),
            FieldLookup::Error(e) => self.lookup_error_expr(e, vec![]),
        }
    }

    fn static_field_get(&mut self, ty: &TypeDef, addr: quill_ast::Address) -> Expr {
        match self.comp.try_lookup_static_constructor_address(ty) {
            Some(cctor) => Expr::Sequential(vec![
                Expr::apply(Expr::GlobalAccess(cctor), vec![]),
                Expr::GlobalAccess(addr),
            ]),
            None => Expr::GlobalAccess(addr),
        }
    }

    fn transform_field_set(
        &mut self,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        field: String,
        value: Expr,
    ) -> Expr {
        self.comp.add_dependency(
            self.current_node.clone(),
            Node::Type(self.resolved_type(&ty.entity)),
        );
        match self.comp.lookup_field(&ty.entity, &field) {
            FieldLookup::Instance { name, .. } => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Instance field {}.{} assigned without a receiver",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                let value = self.transform_expr(value);
                Expr::ItemSet {
                    target: Box::new(this),
                    item: Box::new(Expr::str(name)),
                    value: Box::new(value),
                }
            }
            FieldLookup::Static(addr) => {
                let value = self.transform_expr(value);
                let assign = self.global_set(addr, value);
                match self.comp.try_lookup_static_constructor_address(&ty.entity) {
                    Some(cctor) => Expr::Sequential(vec![
                        Expr::apply(Expr::GlobalAccess(cctor), vec![]),
                        assign,
                    ]),
                    None => assign,
                }
            }
            FieldLookup::Optional(name) => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Instance field {}.{} assigned without a receiver",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                let value = self.transform_expr(value);
                Expr::apply(
                    crate::runtime::global(crate::runtime::helpers::SET_OPTIONAL),
                    vec![this, Expr::str(name), value],
                )
            }
            FieldLookup::Indexed(i) => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Instance field {}.{} assigned without a receiver",
                        ty.entity, field
                    ));
                };
                let this = self.transform_expr(this);
                let value = self.transform_expr(value);
                Expr::ItemSet {
                    target: Box::new(this),
                    item: Box::new(Expr::int(i as i64)),
                    value: Box::new(value),
                }
            }
            FieldLookup::Property { setter, .. } => match setter {
                Some(s) => self.transform_call(this, ty, Concrete::plain(s), vec![value]),
                None => self.source_error(format!(
                    "Property {}.{} has no setter",
                    ty.entity, field
                )),
            },
            FieldLookup::CustomTypeField(ct) => {
                self.custom_type_field_set(ct, this, &ty, &field, value)
            }
            FieldLookup::Error(e) => self.lookup_error_expr(e, vec![value]),
        }
    }

    /// Assignment to a global address.
    fn global_set(&mut self, addr: quill_ast::Address, value: Expr) -> Expr {
        match addr.split_last() {
            Some((name, parent)) => Expr::ItemSet {
                target: Box::new(Expr::GlobalAccess(parent)),
                item: Box::new(Expr::str(name)),
                value: Box::new(value),
            },
            None => self.source_error("Cannot assign to the global root"),
        }
    }

    // ------------------------------------------------------------------
    // Static constructors
    // ------------------------------------------------------------------

    fn transform_cctor(&mut self, ty: &TypeDef) -> Expr {
        match self.comp.try_lookup_static_constructor_address(ty) {
            Some(addr) => {
                self.comp.add_dependency(
                    self.current_node.clone(),
                    Node::Type(self.resolved_type(ty)),
                );
                Expr::apply(Expr::GlobalAccess(addr), vec![])
            }
            None => Expr::Undefined,
        }
    }

    // ------------------------------------------------------------------
    // Type checks
    // ------------------------------------------------------------------

    fn transform_type_check(&mut self, expr: Expr, ty: Type) -> Expr {
        if ty.contains_param() {
            if self.current_is_inline {
                self.has_delayed_transform = true;
                let expr = self.transform_expr(expr);
                return Expr::TypeCheck {
                    expr: Box::new(expr),
                    ty,
                };
            }
            return self.source_error(
                "Using a type test on a type parameter requires the member to be inlined.",
            );
        }
        let e = self.transform_expr(expr);
        match ty {
            Type::Array(_, _) => self.source_error(
                "Type tests on array types are not supported, test against System.Array.",
            ),
            Type::Fun(_, _) => self.source_error(
                "Type tests on function types are not supported, test against Function.",
            ),
            Type::Tuple(_) => Expr::binary(e, BinaryOperator::InstanceOf, Expr::global(["Array"])),
            Type::Void => Expr::binary(e, BinaryOperator::StrictEq, Expr::Value(Literal::Null)),
            Type::Dynamic => self.source_error("Cannot compile a type test against a dynamic type."),
            Type::Param(_) => unreachable!("handled by contains_param"),
            Type::Concrete(c) => self.concrete_type_check(e, c),
        }
    }

    /// A type test against an already translated operand.
    pub(crate) fn concrete_type_check(&mut self, e: Expr, c: Concrete<TypeDef>) -> Expr {
        let td = &c.entity;
        if let Some(s) = known::type_of_test(td) {
            return Expr::binary(
                Expr::unary(UnaryOperator::TypeOf, e),
                BinaryOperator::Eq,
                Expr::str(s),
            );
        }
        if known::is_unit(td) {
            return Expr::binary(e, BinaryOperator::StrictEq, Expr::Value(Literal::Null));
        }
        if *td == known::disposable() {
            return Expr::binary(Expr::str("Dispose"), BinaryOperator::In, e);
        }
        if let Some(g) = known::instance_of_global(td) {
            return Expr::binary(e, BinaryOperator::InstanceOf, Expr::global([g]));
        }
        if let Some(CustomTypeInfo::ErasedUnion(cases)) = self.comp.get_custom_type(td) {
            return self.erased_union_membership(e, &cases);
        }
        if let Some(addr) = self.comp.class_address(td) {
            return Expr::binary(e, BinaryOperator::InstanceOf, Expr::GlobalAccess(addr));
        }
        self.source_error(format!(
            "Cannot compile a type test for {}. Add the Prototype attribute to the class.",
            td
        ))
    }

    /// Membership in an erased union: the case tests ORed together.
    fn erased_union_membership(
        &mut self,
        e: Expr,
        cases: &[quill_metadata::ErasedUnionCase],
    ) -> Expr {
        let needs_binding = e.purity() < Purity::Pure;
        let (subject, bind) = if needs_binding {
            let v = Id::named("x");
            (Expr::Var(v.clone()), Some((v, e)))
        } else {
            (e, None)
        };
        let mut out: Option<Expr> = None;
        for case in cases {
            let test = self.transform_type_check(subject.clone(), case.ty.clone());
            out = Some(match out {
                Some(prev) => Expr::binary(prev, BinaryOperator::Or, test),
                None => test,
            });
        }
        let chain = out.unwrap_or(Expr::bool(false));
        match bind {
            Some((v, e)) => Expr::let_in(v, e, chain),
            None => chain,
        }
    }

    // ------------------------------------------------------------------
    // Trait calls
    // ------------------------------------------------------------------

    fn transform_trait_call(
        &mut self,
        this: Option<Expr>,
        types: Vec<Concrete<TypeDef>>,
        method: Concrete<MethodDef>,
        args: Vec<Expr>,
    ) -> Expr {
        let mut candidates = Vec::new();
        for t in &types {
            for m in self.comp.get_methods(&t.entity) {
                if m.name == method.entity.name && m.params.len() == method.entity.params.len() {
                    candidates.push((t.clone(), m));
                }
            }
        }
        if candidates.len() == 1 {
            let (t, m) = candidates.pop().expect("just checked");
            return self.transform_call(this, t, Concrete::new(m, method.generics.clone()), args);
        }
        if self.current_is_inline {
            // resolution deferred to the call sites of the enclosing inline
            self.has_delayed_transform = true;
            return Expr::TraitCall {
                this: this.map(Box::new),
                types,
                method,
                args,
            };
        }
        if candidates.is_empty() {
            self.source_error(format!(
                "No implementation found for trait call {}",
                method.entity
            ))
        } else {
            self.source_error(format!("Ambiguous trait call {}", method.entity))
        }
    }

    // ------------------------------------------------------------------
    // Ref/out parameters
    // ------------------------------------------------------------------

    fn transform_ref_or_out(&mut self, e: Expr) -> Expr {
        let e = quill_ast::remove_spans(e);
        match e {
            Expr::Var(id) => {
                let v = Id::named("v");
                Expr::Object(vec![
                    (
                        "get".into(),
                        Expr::lambda(vec![], Statement::Return(Expr::Var(id.clone()))),
                    ),
                    (
                        "set".into(),
                        Expr::lambda(
                            vec![v.clone()],
                            Statement::ExprStatement(Expr::VarSet(
                                id,
                                Box::new(Expr::Var(v)),
                            )),
                        ),
                    ),
                ])
            }
            Expr::FieldGet { this, ty, field } => {
                let v = Id::named("v");
                let get = self.transform_field_get(
                    this.clone().map(|b| *b),
                    ty.clone(),
                    field.clone(),
                );
                let set =
                    self.transform_field_set(this.map(|b| *b), ty, field, Expr::Var(v.clone()));
                Expr::Object(vec![
                    ("get".into(), Expr::lambda(vec![], Statement::Return(get))),
                    (
                        "set".into(),
                        Expr::lambda(vec![v], Statement::ExprStatement(set)),
                    ),
                ])
            }
            Expr::ItemGet { target, item, .. } => {
                let t = Id::named("t");
                let i = Id::named("i");
                let v = Id::named("v");
                let target = self.transform_expr(*target);
                let item = self.transform_expr(*item);
                let obj = Expr::Object(vec![
                    (
                        "get".into(),
                        Expr::lambda(
                            vec![],
                            Statement::Return(Expr::ItemGet {
                                target: Box::new(Expr::Var(t.clone())),
                                item: Box::new(Expr::Var(i.clone())),
                                purity: Purity::NoSideEffect,
                            }),
                        ),
                    ),
                    (
                        "set".into(),
                        Expr::lambda(
                            vec![v.clone()],
                            Statement::ExprStatement(Expr::ItemSet {
                                target: Box::new(Expr::Var(t.clone())),
                                item: Box::new(Expr::Var(i.clone())),
                                value: Box::new(Expr::Var(v)),
                            }),
                        ),
                    ),
                ]);
                Expr::let_in(t, target, Expr::let_in(i, item, obj))
            }
            _ => self.source_error("Invalid use of a byref value"),
        }
    }

    // ------------------------------------------------------------------
    // Shaped own-parameters
    // ------------------------------------------------------------------

    fn transform_application(&mut self, target: Expr, args: Vec<Expr>, purity: Purity) -> Expr {
        if !self.shaped_params.is_empty() {
            if let Some(collapsed) = self.try_shaped_application(&target, &args) {
                return collapsed;
            }
        }
        let target = self.transform_expr(target);
        let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
        Expr::Application {
            target: Box::new(target),
            args,
            purity,
        }
    }

    /// Collapse saturated uses of a shaped own-parameter into one flat call.
    fn try_shaped_application(&mut self, target: &Expr, args: &[Expr]) -> Option<Expr> {
        if args.len() != 1 {
            return None;
        }
        // tupled parameter applied to its tuple
        if let Expr::Var(id) = target.strip_span() {
            if let Some(FuncArgOptimization::Tupled(n)) = self.shaped_params.get(id).copied() {
                let id = id.clone();
                return Some(self.tupled_application(id, args[0].clone(), n));
            }
            if let Some(FuncArgOptimization::Curried(1)) = self.shaped_params.get(id).copied() {
                let arg = self.transform_expr(args[0].clone());
                return Some(Expr::apply(Expr::Var(id.clone()), vec![arg]));
            }
        }
        // curried parameter: walk the application spine down to the head
        let mut depth = 1usize;
        let mut cur = target.strip_span();
        while let Expr::Application {
            target: t, args: a, ..
        } = cur
        {
            if a.len() != 1 {
                return None;
            }
            depth += 1;
            cur = t.strip_span();
        }
        let Expr::Var(id) = cur else {
            return None;
        };
        let Some(FuncArgOptimization::Curried(n)) = self.shaped_params.get(id).copied() else {
            return None;
        };
        if depth != n {
            return None;
        }
        let id = id.clone();
        // collect the spine arguments innermost-first
        let mut collected = vec![args[0].clone()];
        let mut cur = target.strip_span();
        while let Expr::Application {
            target: t, args: a, ..
        } = cur
        {
            collected.push(a[0].clone());
            cur = t.strip_span();
        }
        collected.reverse();
        let collected = collected
            .into_iter()
            .map(|a| self.transform_expr(a))
            .collect();
        Some(Expr::apply(Expr::Var(id), collected))
    }

    fn tupled_application(&mut self, id: Id, arg: Expr, n: usize) -> Expr {
        if let Expr::NewArray(items) = arg {
            if items.len() == n {
                let items = items
                    .into_iter()
                    .map(|a| self.transform_expr(a))
                    .collect();
                return Expr::apply(Expr::Var(id), items);
            }
            let items = items
                .into_iter()
                .map(|a| self.transform_expr(a))
                .collect();
            return Expr::apply(Expr::Var(id), vec![Expr::NewArray(items)]);
        }
        let t = Id::named("t");
        let arg = self.transform_expr(arg);
        let items = (0..n)
            .map(|i| Expr::ItemGet {
                target: Box::new(Expr::Var(t.clone())),
                item: Box::new(Expr::int(i as i64)),
                purity: Purity::Pure,
            })
            .collect();
        Expr::let_in(t, arg, Expr::apply(Expr::Var(id), items))
    }

    // ------------------------------------------------------------------
    // Error plumbing
    // ------------------------------------------------------------------

    /// Report a lookup failure and produce a placeholder application so
    /// later passes can proceed.
    pub(crate) fn lookup_error_expr(&mut self, e: LookupError, args: Vec<Expr>) -> Expr {
        match e {
            LookupError::Failed => {}
            LookupError::TypeNotFound(td) => {
                self.comp.add_error(
                    self.current_span,
                    TranslationError::TypeNotFound(td.to_string()),
                );
            }
            LookupError::MemberNotFound(td, sig) => {
                self.comp.add_error(
                    self.current_span,
                    TranslationError::MemberNotFound(format!("{}: {}", td, sig)),
                );
            }
        }
        let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
        Expr::Application {
            target: Box::new(Expr::error_placeholder()),
            args,
            purity: Purity::NonPure,
        }
    }
}

impl Transformer for Translator<'_> {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::WithSpan { span, expr } => {
                let saved = self.current_span;
                self.current_span = Some(span);
                let out = self.transform_expr(*expr);
                self.current_span = saved;
                if self.current_is_inline {
                    out
                } else {
                    Expr::WithSpan {
                        span,
                        expr: Box::new(out),
                    }
                }
            }
            Expr::Call {
                this,
                ty,
                method,
                args,
            } => self.transform_call(this.map(|b| *b), ty, method, args),
            Expr::Ctor { ty, ctor, args } => self.transform_ctor(ty, ctor, args),
            Expr::BaseCtor {
                this,
                ty,
                ctor,
                args,
            } => self.transform_base_ctor(*this, ty, ctor, args),
            Expr::CopyCtor { ty, object } => self.transform_copy_ctor(ty, *object),
            Expr::Cctor(ty) => self.transform_cctor(&ty),
            Expr::NewDelegate { this, ty, method } => {
                self.transform_new_delegate(this.map(|b| *b), ty, method)
            }
            Expr::NewRecord { ty, args } => self.transform_new_record(ty, args),
            Expr::NewUnionCase { ty, case, args } => {
                self.transform_new_union_case(ty, case, args)
            }
            Expr::UnionCaseTest { expr, ty, case } => {
                self.transform_union_case_test(*expr, ty, case)
            }
            Expr::UnionCaseGet {
                expr,
                ty,
                case,
                field,
            } => self.transform_union_case_get(*expr, ty, case, field),
            Expr::UnionCaseTag { expr, ty } => self.transform_union_case_tag(*expr, ty),
            Expr::FieldGet { this, ty, field } => {
                self.transform_field_get(this.map(|b| *b), ty, field)
            }
            Expr::FieldSet {
                this,
                ty,
                field,
                value,
            } => self.transform_field_set(this.map(|b| *b), ty, field, *value),
            Expr::TypeCheck { expr, ty } => self.transform_type_check(*expr, ty),
            Expr::TraitCall {
                this,
                types,
                method,
                args,
            } => self.transform_trait_call(this.map(|b| *b), types, method, args),
            Expr::Application {
                target,
                args,
                purity,
            } => self.transform_application(*target, args, purity),
            Expr::Coalesce { left, right } => {
                let left = self.transform_expr(*left);
                let right = self.transform_expr(*right);
                let v = Id::named("c");
                Expr::let_in(
                    v.clone(),
                    left,
                    Expr::conditional(
                        Expr::binary(
                            Expr::Var(v.clone()),
                            BinaryOperator::Eq,
                            Expr::Value(Literal::Null),
                        ),
                        right,
                        Expr::Var(v),
                    ),
                )
            }
            Expr::Await(_) => {
                self.source_error("await is only allowed inside an asynchronous context")
            }
            Expr::NamedParameter { value, .. } => self.transform_expr(*value),
            Expr::RefOrOutParameter(e) => self.transform_ref_or_out(*e),
            Expr::Base => {
                self.source_error("A base reference is only valid as a call receiver")
            }
            Expr::SelfAddress => match &self.self_address {
                Some(addr) => Expr::GlobalAccess(addr.clone()),
                None => self.source_error("Self reference outside of a class context"),
            },
            Expr::Hole(i) => {
                if self.current_is_inline {
                    Expr::Hole(i)
                } else {
                    self.source_error("Placeholder outside of an inline body")
                }
            }
            other => self.transform_expr_parts(other),
        }
    }

    fn transform_statement(&mut self, stmt: Statement) -> Statement {
        match stmt {
            Statement::WithSpan { span, statement } => {
                let saved = self.current_span;
                self.current_span = Some(span);
                let out = self.transform_statement(*statement);
                self.current_span = saved;
                Statement::WithSpan {
                    span,
                    statement: Box::new(out),
                }
            }
            other => self.transform_statement_parts(other),
        }
    }
}
