//! Call and constructor lowering.
//!
//! `transform_call`/`transform_ctor` resolve the target through the
//! metadata database and dispatch on its compilation kind; inline
//! members still on the work queue are compiled on demand, with the
//! in-progress stack guarding against inline cycles.

use quill_ast::{
    known, BinaryOperator, Concrete, ConstructorDef, Expr, FuncArgOptimization, Id, MethodDef,
    Purity, Statement, Transformer, TypeDef, UnaryOperator,
};
use quill_metadata::{Member, MethodLookup, Node, Optimizations, RemotingKind, TranslationError};

use super::Translator;
use crate::runtime::{self, helpers};
use crate::subst::{GenericInlineResolver, Substitution};

/// The node a macro invocation must preserve when its translation is
/// delayed, and the slot a fallback dispatch goes through.
pub(super) enum MacroOriginal {
    Call {
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        method: Concrete<MethodDef>,
        args: Vec<Expr>,
        base_call: bool,
    },
    Ctor {
        ty: Concrete<TypeDef>,
        ctor: ConstructorDef,
        args: Vec<Expr>,
    },
}

impl Translator<'_> {
    // ------------------------------------------------------------------
    // Method calls
    // ------------------------------------------------------------------

    pub(crate) fn transform_call(
        &mut self,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        method: Concrete<MethodDef>,
        args: Vec<Expr>,
    ) -> Expr {
        if ty.entity.is_dynamic() {
            return self.dynamic_call(this, method.entity, args);
        }
        let (this, base_call) = match this {
            Some(t) if matches!(t.strip_span(), Expr::Base) => (Some(Expr::This), true),
            other => (other, false),
        };
        match self.comp.lookup_method(&ty.entity, &method.entity) {
            MethodLookup::Compiled { member, opts, body } => {
                // inline-substituted calls do not survive into the output,
                // so they contribute no edge of their own
                if !member.is_inline() {
                    self.add_method_edge(&ty.entity, &method.entity);
                }
                self.compile_call(member, opts, body, this, ty, method, args, base_call)
            }
            MethodLookup::Compiling { member, opts } => {
                if member.is_inline() {
                    if self.compile_now_method(&ty.entity, &method.entity) {
                        self.transform_call(this, ty, method, args)
                    } else {
                        Expr::error_placeholder()
                    }
                } else {
                    self.add_method_edge(&ty.entity, &method.entity);
                    self.compile_call(member, opts, None, this, ty, method, args, base_call)
                }
            }
            MethodLookup::CustomTypeMember(ct) => {
                self.custom_type_call(ct, this, ty, method, args)
            }
            MethodLookup::Error(e) => {
                self.add_method_edge(&ty.entity, &method.entity);
                self.lookup_error_expr(e, args)
            }
        }
    }

    /// Compile a queued inline member before its call site needs it.
    /// Returns false when the member is unavailable (cycle or failure).
    pub(crate) fn compile_now_method(&mut self, ty: &TypeDef, method: &MethodDef) -> bool {
        let rty = self.resolved_type(ty);
        let node = Node::Method(rty.clone(), method.clone());
        if self.in_progress.contains(&node) {
            let message = format!("Inline loop found at method {}.{}", rty, method.name);
            self.comp
                .add_error(self.current_span, TranslationError::SourceError(message));
            self.comp.failed_compiled_method(rty, method.clone());
            if self.current_is_inline {
                self.fail_current();
            }
            return false;
        }
        let Some(cm) = self.comp.take_compiling_method(&rty, method) else {
            return !self.comp.is_failed(&node);
        };
        crate::driver::translate_compiling_member(
            self.comp,
            self.options,
            cm,
            self.in_progress.clone(),
        );
        if self.comp.is_failed(&node) {
            if self.current_is_inline {
                self.fail_current();
            }
            false
        } else {
            true
        }
    }

    fn compile_now_constructor(&mut self, ty: &TypeDef, ctor: &ConstructorDef) -> bool {
        let rty = self.resolved_type(ty);
        let node = Node::Constructor(rty.clone(), ctor.clone());
        if self.in_progress.contains(&node) {
            let message = format!("Inline loop found at constructor of {}", rty);
            self.comp
                .add_error(self.current_span, TranslationError::SourceError(message));
            self.comp.failed_compiled_constructor(rty, ctor.clone());
            if self.current_is_inline {
                self.fail_current();
            }
            return false;
        }
        let Some(cm) = self.comp.take_compiling_constructor(&rty, ctor) else {
            return !self.comp.is_failed(&node);
        };
        crate::driver::translate_compiling_member(
            self.comp,
            self.options,
            cm,
            self.in_progress.clone(),
        );
        if self.comp.is_failed(&node) {
            if self.current_is_inline {
                self.fail_current();
            }
            false
        } else {
            true
        }
    }

    fn add_method_edge(&mut self, ty: &TypeDef, method: &MethodDef) {
        if !self.comp.has_graph() {
            return;
        }
        let rty = self.resolved_type(ty);
        let to = if self.comp.is_interface(&rty) {
            Node::AbstractMethod(rty, method.clone())
        } else if self.comp.method_exists_in_metadata(&rty, method) {
            Node::Method(rty, method.clone())
        } else {
            Node::Type(rty)
        };
        self.comp.add_dependency(self.current_node.clone(), to);
    }

    fn dynamic_call(&mut self, this: Option<Expr>, method: MethodDef, args: Vec<Expr>) -> Expr {
        let name = method.name.clone();
        if let Some(op) = binary_operator_name(&name) {
            if args.len() == 2 {
                let mut it = args.into_iter();
                let left = self.transform_expr(it.next().expect("two args"));
                let right = self.transform_expr(it.next().expect("two args"));
                return Expr::binary(left, op, right);
            }
        }
        if let Some(op) = unary_operator_name(&name) {
            if args.len() == 1 {
                let e = self.transform_expr(args.into_iter().next().expect("one arg"));
                return Expr::unary(op, e);
            }
        }
        if (name == "op_Increment" || name == "op_Decrement") && args.len() == 1 {
            let op = if name == "op_Increment" {
                BinaryOperator::Add
            } else {
                BinaryOperator::Sub
            };
            let e = self.transform_expr(args.into_iter().next().expect("one arg"));
            return Expr::binary(e, op, Expr::int(1));
        }
        match this {
            Some(this) => {
                let this = self.transform_expr(this);
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Expr::Application {
                    target: Box::new(Expr::item(this, name, Purity::NoSideEffect)),
                    args,
                    purity: Purity::NonPure,
                }
            }
            None => self.source_error(format!(
                "Static method call on a dynamic object is not supported: {}",
                name
            )),
        }
    }

    /// Dispatch a resolved method by its compilation kind.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn compile_call(
        &mut self,
        member: Member,
        opts: Optimizations,
        body: Option<Expr>,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        method: Concrete<MethodDef>,
        args: Vec<Expr>,
        base_call: bool,
    ) -> Expr {
        if let Some(w) = &opts.warn {
            let w = w.clone();
            self.warning(w);
        }
        let args = self.shape_arguments(&opts, args);
        match member {
            Member::Instance(name) => {
                let Some(this) = this else {
                    return self.source_error(format!(
                        "Instance method {}.{} called without a receiver",
                        ty.entity, method.entity.name
                    ));
                };
                let this = self.transform_expr(this);
                let args: Vec<Expr> =
                    args.into_iter().map(|a| self.transform_expr(a)).collect();
                if base_call {
                    let Some(addr) = self.comp.class_address(&ty.entity) else {
                        return self.source_error(format!(
                            "Base call to a class without a prototype address: {}",
                            ty.entity
                        ));
                    };
                    let proto = Expr::item(Expr::GlobalAccess(addr), "prototype", Purity::Pure);
                    let target =
                        Expr::item(Expr::item(proto, name, Purity::Pure), "call", Purity::Pure);
                    let mut call_args = vec![this];
                    call_args.extend(args);
                    Expr::apply(target, call_args)
                } else {
                    Expr::Application {
                        target: Box::new(Expr::item(this, name, Purity::NoSideEffect)),
                        args,
                        purity: opts.purity,
                    }
                }
            }
            Member::Static(addr) => {
                let mut all = Vec::new();
                if let Some(t) = this {
                    all.push(self.transform_expr(t));
                }
                all.extend(args.into_iter().map(|a| self.transform_expr(a)));
                Expr::Application {
                    target: Box::new(Expr::GlobalAccess(addr)),
                    args: all,
                    purity: opts.purity,
                }
            }
            Member::Inline => {
                let Some(body) = body else {
                    return self.source_error(format!(
                        "Inline member {}.{} has no compiled body",
                        ty.entity, method.entity.name
                    ));
                };
                let this = this.map(|t| self.transform_expr(t));
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Substitution::new(args, this).transform_expr(body)
            }
            Member::NotCompiledInline => {
                let Some(body) = body else {
                    return self.source_error(format!(
                        "Inline member {}.{} has no body",
                        ty.entity, method.entity.name
                    ));
                };
                let mut generics = ty.generics.clone();
                generics.extend(method.generics.iter().cloned());
                let body = if generics.is_empty() {
                    body
                } else {
                    GenericInlineResolver::new(generics).transform_expr(body)
                };
                let substituted = Substitution::new(args, this).transform_expr(body);
                self.transform_expr(substituted)
            }
            Member::Macro {
                macro_type,
                parameter,
                fallback,
            } => self.macro_invoke(
                macro_type,
                parameter,
                fallback.map(|b| *b),
                opts,
                body,
                MacroOriginal::Call {
                    this,
                    ty,
                    method,
                    args,
                    base_call,
                },
            ),
            Member::Remote {
                kind,
                handle,
                provider,
            } => self.remote_call(kind, handle, provider, &method.entity, args),
            Member::Constructor(_) => self.source_error(format!(
                "Constructor found where a method was expected: {}.{}",
                ty.entity, method.entity.name
            )),
        }
    }

    /// Pre-adapt arguments to the member's declared shapes.
    fn shape_arguments(&mut self, opts: &Optimizations, args: Vec<Expr>) -> Vec<Expr> {
        let Some(shapes) = &opts.func_args else {
            return args;
        };
        let shapes = shapes.clone();
        args.into_iter()
            .enumerate()
            .map(|(i, arg)| {
                match shapes.get(i).copied().unwrap_or(FuncArgOptimization::NotOptimized) {
                    FuncArgOptimization::NotOptimized => arg,
                    FuncArgOptimization::Curried(n) => Self::shape_curried_arg(arg, n),
                    FuncArgOptimization::Tupled(n) => Self::shape_tupled_arg(arg, n),
                }
            })
            .collect()
    }

    fn shape_curried_arg(arg: Expr, n: usize) -> Expr {
        if let Expr::OptimizedClosure { expr, shape } = &arg {
            if *shape == FuncArgOptimization::Curried(n) {
                return (**expr).clone();
            }
        }
        // wrap: fn (x1, .., xn) { return e(x1)..(xn); }
        let params: Vec<Id> = (0..n).map(|_| Id::named("x")).collect();
        let mut call = arg;
        for p in &params {
            call = Expr::apply(call, vec![Expr::Var(p.clone())]);
        }
        Expr::lambda(params, Statement::Return(call))
    }

    fn shape_tupled_arg(arg: Expr, n: usize) -> Expr {
        if let Expr::OptimizedClosure { expr, shape } = &arg {
            if *shape == FuncArgOptimization::Tupled(n) {
                return (**expr).clone();
            }
        }
        if let Expr::Function { params, body } = &arg {
            if params.len() == 1 {
                if let Some(flattened) = flatten_tuple_lambda(&params[0], body, n) {
                    return flattened;
                }
            }
        }
        // wrap: fn (x0, .., x_{n-1}) { return e([x0, .., x_{n-1}]); }
        let params: Vec<Id> = (0..n).map(|_| Id::named("x")).collect();
        let tuple = Expr::NewArray(params.iter().map(|p| Expr::Var(p.clone())).collect());
        Expr::lambda(params, Statement::Return(Expr::apply(arg, vec![tuple])))
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub(crate) fn transform_ctor(
        &mut self,
        ty: Concrete<TypeDef>,
        ctor: ConstructorDef,
        args: Vec<Expr>,
    ) -> Expr {
        match self.comp.lookup_constructor(&ty.entity, &ctor) {
            MethodLookup::Compiled { member, opts, body } => {
                if !member.is_inline() {
                    self.add_constructor_edge(&ty.entity, &ctor);
                }
                self.compile_ctor(member, opts, body, ty, ctor, args)
            }
            MethodLookup::Compiling { member, opts } => {
                if member.is_inline() {
                    if self.compile_now_constructor(&ty.entity, &ctor) {
                        self.transform_ctor(ty, ctor, args)
                    } else {
                        Expr::error_placeholder()
                    }
                } else {
                    self.add_constructor_edge(&ty.entity, &ctor);
                    self.compile_ctor(member, opts, None, ty, ctor, args)
                }
            }
            MethodLookup::CustomTypeMember(ct) => self.custom_type_ctor(ct, ty, args),
            MethodLookup::Error(e) => {
                self.add_constructor_edge(&ty.entity, &ctor);
                self.lookup_error_expr(e, args)
            }
        }
    }

    fn add_constructor_edge(&mut self, ty: &TypeDef, ctor: &ConstructorDef) {
        if !self.comp.has_graph() {
            return;
        }
        let rty = self.resolved_type(ty);
        let to = if self.comp.constructor_exists_in_metadata(&rty, ctor) {
            Node::Constructor(rty, ctor.clone())
        } else {
            Node::Type(rty)
        };
        self.comp.add_dependency(self.current_node.clone(), to);
    }

    pub(super) fn compile_ctor(
        &mut self,
        member: Member,
        opts: Optimizations,
        body: Option<Expr>,
        ty: Concrete<TypeDef>,
        ctor: ConstructorDef,
        args: Vec<Expr>,
    ) -> Expr {
        if let Some(w) = &opts.warn {
            let w = w.clone();
            self.warning(w);
        }
        let args = self.shape_arguments(&opts, args);
        match member {
            Member::Constructor(addr) => {
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Expr::New {
                    target: Box::new(Expr::GlobalAccess(addr)),
                    args,
                }
            }
            Member::Static(addr) => {
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Expr::Application {
                    target: Box::new(Expr::GlobalAccess(addr)),
                    args,
                    purity: opts.purity,
                }
            }
            Member::Inline => {
                let Some(body) = body else {
                    return self.source_error(format!(
                        "Inline constructor of {} has no compiled body",
                        ty.entity
                    ));
                };
                let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
                Substitution::new(args, None).transform_expr(body)
            }
            Member::NotCompiledInline => {
                let Some(body) = body else {
                    return self.source_error(format!(
                        "Inline constructor of {} has no body",
                        ty.entity
                    ));
                };
                let body = if ty.generics.is_empty() {
                    body
                } else {
                    GenericInlineResolver::new(ty.generics.clone()).transform_expr(body)
                };
                let substituted = Substitution::new(args, None).transform_expr(body);
                self.transform_expr(substituted)
            }
            Member::Macro {
                macro_type,
                parameter,
                fallback,
            } => self.macro_invoke(
                macro_type,
                parameter,
                fallback.map(|b| *b),
                opts,
                body,
                MacroOriginal::Ctor { ty, ctor, args },
            ),
            Member::Instance(_) | Member::Remote { .. } => self.source_error(format!(
                "Invalid metadata for constructor of {}",
                ty.entity
            )),
        }
    }

    pub(crate) fn transform_base_ctor(
        &mut self,
        this: Expr,
        ty: Concrete<TypeDef>,
        ctor: ConstructorDef,
        args: Vec<Expr>,
    ) -> Expr {
        if self.current_is_inline && matches!(this.strip_span(), Expr::This) {
            // inside an inline body the object under construction is the
            // call site's concern; keep the new-form
            return self.transform_ctor(ty, ctor, args);
        }
        let this = self.transform_expr(this);
        let ctor_expr = self.transform_ctor(ty, ctor, args);
        match base_ctor_rewrite(this, ctor_expr) {
            Ok(e) => e,
            Err(_) => self.source_error(
                "The constructor is not valid as a base constructor call",
            ),
        }
    }

    // ------------------------------------------------------------------
    // Delegates
    // ------------------------------------------------------------------

    pub(crate) fn transform_new_delegate(
        &mut self,
        this: Option<Expr>,
        ty: Concrete<TypeDef>,
        method: Concrete<MethodDef>,
    ) -> Expr {
        self.add_method_edge(&ty.entity, &method.entity);
        match self.comp.lookup_method(&ty.entity, &method.entity) {
            MethodLookup::Compiled { member, .. } | MethodLookup::Compiling { member, .. } => {
                match member {
                    Member::Static(addr) => Expr::GlobalAccess(addr),
                    Member::Instance(name) => {
                        let Some(addr) = self.comp.class_address(&ty.entity) else {
                            return self.source_error(format!(
                                "Cannot create a delegate for {}.{}: the class has no address",
                                ty.entity, method.entity.name
                            ));
                        };
                        let this = match this {
                            Some(t) => self.transform_expr(t),
                            None => Expr::Undefined,
                        };
                        let proto =
                            Expr::item(Expr::GlobalAccess(addr), "prototype", Purity::Pure);
                        Expr::apply(
                            runtime::global(helpers::BIND_DELEGATE),
                            vec![Expr::item(proto, name, Purity::Pure), this],
                        )
                    }
                    _ => {
                        self.warning(
                            "Creating a delegate from an inlined or macro member; \
                             delegate equality will not be preserved",
                        );
                        let params: Vec<Id> = (0..method.entity.params.len())
                            .map(|_| Id::named("a"))
                            .collect();
                        let call = Expr::Call {
                            this: this.map(Box::new),
                            ty,
                            method,
                            args: params.iter().map(|p| Expr::Var(p.clone())).collect(),
                        };
                        let f = Expr::lambda(params, Statement::Return(call));
                        self.transform_expr(f)
                    }
                }
            }
            MethodLookup::CustomTypeMember(_) => self.source_error(format!(
                "Cannot create a delegate from {}.{}",
                ty.entity, method.entity.name
            )),
            MethodLookup::Error(e) => self.lookup_error_expr(e, vec![]),
        }
    }

    // ------------------------------------------------------------------
    // Remote calls
    // ------------------------------------------------------------------

    fn remote_call(
        &mut self,
        kind: RemotingKind,
        handle: String,
        provider: Option<TypeDef>,
        method: &MethodDef,
        args: Vec<Expr>,
    ) -> Expr {
        let provider_obj = match provider {
            Some(p) => match self.comp.class_address(&p) {
                Some(addr) => Expr::New {
                    target: Box::new(Expr::GlobalAccess(addr)),
                    args: vec![],
                },
                None => {
                    return self.source_error(format!(
                        "Remoting provider {} has no address",
                        p
                    ))
                }
            },
            None => runtime::default_remoting_provider(),
        };
        // the server-side handler and everything in the result shape must
        // end up in the dependency closure
        self.comp.add_dependency(
            self.current_node.clone(),
            Node::AbstractMethod(
                known::remoting_provider(),
                known::remoting_method(kind.method_name()),
            ),
        );
        let mut return_defs = Vec::new();
        method.returns.collect_type_defs(&mut return_defs);
        for td in return_defs {
            self.comp
                .add_dependency(self.current_node.clone(), Node::Type(td));
        }
        let args = args.into_iter().map(|a| self.transform_expr(a)).collect();
        Expr::apply(
            Expr::item(provider_obj, kind.method_name(), Purity::NoSideEffect),
            vec![Expr::str(handle), Expr::NewArray(args)],
        )
    }
}

/// Rewrite a translated constructor expression into a `F.call(this, ..)`
/// form for base-constructor chaining.
fn base_ctor_rewrite(this: Expr, ctor: Expr) -> Result<Expr, Expr> {
    match ctor {
        Expr::WithSpan { span, expr } => match base_ctor_rewrite(this, *expr) {
            Ok(e) => Ok(Expr::WithSpan {
                span,
                expr: Box::new(e),
            }),
            Err(e) => Err(Expr::WithSpan {
                span,
                expr: Box::new(e),
            }),
        },
        Expr::New { target, args } => {
            let call = Expr::item(*target, "call", Purity::Pure);
            let mut call_args = vec![this];
            call_args.extend(args);
            Ok(Expr::apply(call, call_args))
        }
        Expr::Let { var, value, body } => match *body {
            Expr::New { target, args }
                if args.len() == 1 && matches!(&args[0], Expr::Var(v) if *v == var) =>
            {
                let call = Expr::item(*target, "call", Purity::Pure);
                Ok(Expr::apply(call, vec![this, *value]))
            }
            body => Err(Expr::Let {
                var,
                value,
                body: Box::new(body),
            }),
        },
        other => Err(other),
    }
}

fn binary_operator_name(name: &str) -> Option<BinaryOperator> {
    Some(match name {
        "op_Addition" => BinaryOperator::Add,
        "op_Subtraction" => BinaryOperator::Sub,
        "op_Multiply" => BinaryOperator::Mul,
        "op_Division" => BinaryOperator::Div,
        "op_Modulus" => BinaryOperator::Mod,
        "op_Equality" => BinaryOperator::Eq,
        "op_Inequality" => BinaryOperator::NotEq,
        "op_LessThan" => BinaryOperator::Less,
        "op_LessThanOrEqual" => BinaryOperator::LessEq,
        "op_GreaterThan" => BinaryOperator::Greater,
        "op_GreaterThanOrEqual" => BinaryOperator::GreaterEq,
        "op_BitwiseAnd" => BinaryOperator::BitAnd,
        "op_BitwiseOr" => BinaryOperator::BitOr,
        "op_ExclusiveOr" => BinaryOperator::BitXor,
        "op_LeftShift" => BinaryOperator::Shl,
        "op_RightShift" => BinaryOperator::Shr,
        "op_BooleanAnd" => BinaryOperator::And,
        "op_BooleanOr" => BinaryOperator::Or,
        _ => return None,
    })
}

fn unary_operator_name(name: &str) -> Option<UnaryOperator> {
    Some(match name {
        "op_UnaryNegation" => UnaryOperator::Neg,
        "op_UnaryPlus" => UnaryOperator::Plus,
        "op_LogicalNot" => UnaryOperator::Not,
        "op_OnesComplement" => UnaryOperator::BitNot,
        _ => return None,
    })
}

/// Rewrite `fn (t) { ... t[i] ... }` into `fn (x0, .., x_{n-1}) { ... xi ... }`.
fn flatten_tuple_lambda(param: &Id, body: &Statement, n: usize) -> Option<Expr> {
    struct Flattener {
        tuple: Id,
        items: Vec<Id>,
        failed: bool,
    }
    impl Transformer for Flattener {
        fn transform_expr(&mut self, expr: Expr) -> Expr {
            match expr {
                Expr::ItemGet { target, item, purity } => {
                    if let (Expr::Var(v), Expr::Value(quill_ast::Literal::Int(i))) =
                        (target.strip_span(), item.strip_span())
                    {
                        if *v == self.tuple {
                            if let Some(id) = self.items.get(*i as usize) {
                                return Expr::Var(id.clone());
                            }
                            self.failed = true;
                        }
                    }
                    Expr::ItemGet {
                        target: Box::new(self.transform_expr(*target)),
                        item: Box::new(self.transform_expr(*item)),
                        purity,
                    }
                }
                Expr::Var(v) if v == self.tuple => {
                    self.failed = true;
                    Expr::Var(v)
                }
                other => self.transform_expr_parts(other),
            }
        }
    }
    let items: Vec<Id> = (0..n).map(|_| Id::named("x")).collect();
    let mut f = Flattener {
        tuple: param.clone(),
        items: items.clone(),
        failed: false,
    };
    let body = f.transform_statement(body.clone());
    if f.failed {
        return None;
    }
    Some(Expr::Function {
        params: items,
        body: Box::new(body),
    })
}
