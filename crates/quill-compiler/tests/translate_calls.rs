//! Call lowering against hand-wired metadata.

mod common;

use common::*;
use quill_ast::{
    Address, BinaryOperator, Expr, FuncArgOptimization, Id, Purity, Statement, Type,
    TypeDef, UnaryOperator,
};
use quill_metadata::{
    Compilation, Macro, MacroCall, MacroResult, Member, Node, Optimizations, RemotingKind,
    TranslationError,
};

fn call(this: Option<Expr>, td: &TypeDef, m: &quill_ast::MethodDef, args: Vec<Expr>) -> Expr {
    Expr::Call {
        this: this.map(Box::new),
        ty: plain(td.clone()),
        method: plain(m.clone()),
        args,
    }
}

#[test]
fn test_static_call_goes_to_address() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("M", 1);
    static_method(&mut comp, &t, &m, &["N", "M"]);

    let out = translate(&mut comp, call(None, &t, &m, vec![Expr::int(2)]));
    assert_eq!(
        out,
        Expr::apply(Expr::global(["N", "M"]), vec![Expr::int(2)])
    );
    // the call is recorded in the dependency graph
    assert!(comp
        .graph()
        .unwrap()
        .has_edge(&caller(), &Node::Method(t, m)));
}

#[test]
fn test_inline_call_substitutes_body_without_edge() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("id", 1);
    inline_method(&mut comp, &t, &m, Expr::Hole(0));

    let out = translate(&mut comp, call(None, &t, &m, vec![Expr::int(3)]));
    assert_eq!(out, Expr::int(3));
    assert!(!comp
        .graph()
        .unwrap()
        .has_edge(&caller(), &Node::Method(t, m)));
}

#[test]
fn test_instance_call_dispatches_through_receiver() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("M", 1);
    instance_method(&mut comp, &t, &m, "m");

    let obj = Id::named("obj");
    let out = translate(
        &mut comp,
        call(Some(Expr::Var(obj.clone())), &t, &m, vec![Expr::int(1)]),
    );
    assert_eq!(
        out,
        Expr::Application {
            target: Box::new(Expr::item(
                Expr::Var(obj),
                "m",
                Purity::NoSideEffect
            )),
            args: vec![Expr::int(1)],
            purity: Purity::NonPure,
        }
    );
}

#[test]
fn test_base_call_uses_prototype_call_form() {
    let mut comp = Compilation::new();
    let p = ty("P");
    class_at(&mut comp, &p, &["P"]);
    let m = method("M", 1);
    instance_method(&mut comp, &p, &m, "M");

    let a = Id::named("a");
    let out = translate(
        &mut comp,
        call(Some(Expr::Base), &p, &m, vec![Expr::Var(a.clone())]),
    );
    // P.prototype.M.call(this, a)
    let proto = Expr::item(Expr::global(["P"]), "prototype", Purity::Pure);
    let target = Expr::item(
        Expr::item(proto, "M", Purity::Pure),
        "call",
        Purity::Pure,
    );
    assert_eq!(
        out,
        Expr::apply(target, vec![Expr::This, Expr::Var(a)])
    );
}

#[test]
fn test_missing_member_reports_and_emits_placeholder() {
    let mut comp = Compilation::new();
    let t = ty("T");
    comp.add_class(t.clone(), Default::default());
    let m = method("gone", 0);

    let out = translate(&mut comp, call(None, &t, &m, vec![]));
    assert_eq!(
        out,
        Expr::Application {
            target: Box::new(Expr::error_placeholder()),
            args: vec![],
            purity: Purity::NonPure,
        }
    );
    assert!(comp
        .errors()
        .iter()
        .any(|d| matches!(d.error, TranslationError::MemberNotFound(_))));
}

#[test]
fn test_dynamic_operator_methods() {
    let mut comp = Compilation::new();
    let dynamic = quill_ast::known::dynamic();
    let add = method("op_Addition", 2);
    let out = translate(
        &mut comp,
        call(None, &dynamic, &add, vec![Expr::int(1), Expr::int(2)]),
    );
    assert_eq!(
        out,
        Expr::binary(Expr::int(1), BinaryOperator::Add, Expr::int(2))
    );

    let inc = method("op_Increment", 1);
    let out = translate(&mut comp, call(None, &dynamic, &inc, vec![Expr::int(5)]));
    assert_eq!(
        out,
        Expr::binary(Expr::int(5), BinaryOperator::Add, Expr::int(1))
    );

    let neg = method("op_UnaryNegation", 1);
    let out = translate(&mut comp, call(None, &dynamic, &neg, vec![Expr::int(5)]));
    assert_eq!(out, Expr::unary(UnaryOperator::Neg, Expr::int(5)));
}

#[test]
fn test_dynamic_instance_call_is_indexed() {
    let mut comp = Compilation::new();
    let dynamic = quill_ast::known::dynamic();
    let m = method("push", 1);
    let obj = Id::named("xs");
    let out = translate(
        &mut comp,
        call(
            Some(Expr::Var(obj.clone())),
            &dynamic,
            &m,
            vec![Expr::int(1)],
        ),
    );
    assert_eq!(
        out,
        Expr::Application {
            target: Box::new(Expr::item(
                Expr::Var(obj),
                "push",
                Purity::NoSideEffect
            )),
            args: vec![Expr::int(1)],
            purity: Purity::NonPure,
        }
    );
    // a receiverless dynamic call is an error
    let out = translate(&mut comp, call(None, &dynamic, &m, vec![Expr::int(1)]));
    assert_eq!(out, Expr::error_placeholder());
}

#[test]
fn test_curried_argument_shaping() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("iter", 1);
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Static(Address::global(["T", "iter"])),
        Optimizations {
            func_args: Some(vec![FuncArgOptimization::Curried(3)]),
            ..Optimizations::default()
        },
        Expr::Undefined,
    );

    let f = Id::named("f");
    let out = translate(&mut comp, call(None, &t, &m, vec![Expr::Var(f.clone())]));
    let Expr::Application { args, .. } = out else {
        panic!("expected application");
    };
    // fn (x, y, z) { return f(x)(y)(z); }
    let Expr::Function { params, body } = &args[0] else {
        panic!("expected shaped lambda, got {:?}", args[0]);
    };
    assert_eq!(params.len(), 3);
    let Statement::Return(mut spine) = (**body).clone() else {
        panic!("expected return");
    };
    for expected in params.iter().rev() {
        let Expr::Application { target, args, .. } = spine else {
            panic!("expected application spine");
        };
        assert_eq!(args, vec![Expr::Var(expected.clone())]);
        spine = *target;
    }
    assert_eq!(spine, Expr::Var(f));
}

#[test]
fn test_already_shaped_argument_is_stripped() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("iter", 1);
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Static(Address::global(["T", "iter"])),
        Optimizations {
            func_args: Some(vec![FuncArgOptimization::Curried(3)]),
            ..Optimizations::default()
        },
        Expr::Undefined,
    );

    let g = Id::named("g");
    let shaped = Expr::OptimizedClosure {
        expr: Box::new(Expr::Var(g.clone())),
        shape: FuncArgOptimization::Curried(3),
    };
    let out = translate(&mut comp, call(None, &t, &m, vec![shaped]));
    assert_eq!(
        out,
        Expr::apply(Expr::global(["T", "iter"]), vec![Expr::Var(g)])
    );
}

#[test]
fn test_trait_call_resolves_single_candidate() {
    let mut comp = Compilation::new();
    let a = ty("A");
    let b = ty("B");
    comp.add_class(a.clone(), Default::default());
    comp.add_class(b.clone(), Default::default());
    let m = method("Show", 0);
    instance_method(&mut comp, &b, &m, "show");

    let obj = Id::named("x");
    let out = translate(
        &mut comp,
        Expr::TraitCall {
            this: Some(Box::new(Expr::Var(obj.clone()))),
            types: vec![plain(a), plain(b)],
            method: plain(m),
            args: vec![],
        },
    );
    assert_eq!(
        out,
        Expr::Application {
            target: Box::new(Expr::item(Expr::Var(obj), "show", Purity::NoSideEffect)),
            args: vec![],
            purity: Purity::NonPure,
        }
    );
}

#[test]
fn test_ambiguous_trait_call_is_an_error_outside_inline() {
    let mut comp = Compilation::new();
    let a = ty("A");
    let b = ty("B");
    let m = method("Show", 0);
    instance_method(&mut comp, &a, &m, "show");
    instance_method(&mut comp, &b, &m, "show");

    let out = translate(
        &mut comp,
        Expr::TraitCall {
            this: Some(Box::new(Expr::Undefined)),
            types: vec![plain(a), plain(b)],
            method: plain(m),
            args: vec![],
        },
    );
    assert_eq!(out, Expr::error_placeholder());
    assert!(comp.has_errors());
}

#[test]
fn test_remote_call_shape_and_edges() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("Fetch", 1);
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Remote {
            kind: RemotingKind::Async,
            handle: "T.Fetch".into(),
            provider: None,
        },
        Optimizations::default(),
        Expr::Undefined,
    );

    let out = translate(&mut comp, call(None, &t, &m, vec![Expr::int(7)]));
    assert_eq!(
        out,
        Expr::apply(
            Expr::item(
                Expr::global(["Remoting"]),
                "Async",
                Purity::NoSideEffect
            ),
            vec![Expr::str("T.Fetch"), Expr::NewArray(vec![Expr::int(7)])],
        )
    );
    let rpc = Node::AbstractMethod(
        quill_ast::known::remoting_provider(),
        quill_ast::known::remoting_method("Async"),
    );
    assert!(comp.graph().unwrap().has_edge(&caller(), &rpc));
}

#[test]
fn test_translation_is_idempotent_on_js_nodes() {
    let mut comp = Compilation::new();
    let x = Id::named("x");
    let e = Expr::conditional(
        Expr::binary(Expr::Var(x.clone()), BinaryOperator::Less, Expr::int(10)),
        Expr::Object(vec![("a".into(), Expr::int(1))]),
        Expr::NewArray(vec![Expr::global(["G"]), Expr::str("s")]),
    );
    let out = translate(&mut comp, e.clone());
    assert_eq!(out, e);
    assert!(!comp.has_errors());
}

struct FallbackMacro;

impl Macro for FallbackMacro {
    fn translate_call(&mut self, _call: MacroCall<'_>) -> MacroResult {
        MacroResult::Fallback
    }
}

#[test]
fn test_macro_fallback_to_inline() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("fm", 1);
    let macro_ty = ty("MyMacro");
    comp.register_macro(macro_ty.clone(), Box::new(FallbackMacro));
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Macro {
            macro_type: macro_ty,
            parameter: None,
            fallback: Some(Box::new(Member::Inline)),
        },
        Optimizations::default(),
        Expr::binary(Expr::Hole(0), BinaryOperator::Add, Expr::int(1)),
    );

    let out = translate(&mut comp, call(None, &t, &m, vec![Expr::int(4)]));
    assert_eq!(
        out,
        Expr::binary(Expr::int(4), BinaryOperator::Add, Expr::int(1))
    );
    assert!(!comp.has_errors());
}

#[test]
fn test_macro_fallback_without_fallback_kind_is_an_error() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("fm", 0);
    let macro_ty = ty("MyMacro");
    comp.register_macro(macro_ty.clone(), Box::new(FallbackMacro));
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Macro {
            macro_type: macro_ty,
            parameter: None,
            fallback: None,
        },
        Optimizations::default(),
        Expr::Undefined,
    );

    let out = translate(&mut comp, call(None, &t, &m, vec![]));
    assert_eq!(out, Expr::error_placeholder());
    assert!(comp
        .errors()
        .iter()
        .any(|d| matches!(d.error, TranslationError::MacroError { .. })));
}

struct ConstMacro;

impl Macro for ConstMacro {
    fn translate_call(&mut self, _call: MacroCall<'_>) -> MacroResult {
        MacroResult::Warning(
            "const folded".into(),
            Box::new(MacroResult::Ok(Expr::int(42))),
        )
    }
}

#[test]
fn test_macro_ok_result_is_translated_and_warning_recorded() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("answer", 0);
    let macro_ty = ty("ConstMacro");
    comp.register_macro(macro_ty.clone(), Box::new(ConstMacro));
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Macro {
            macro_type: macro_ty,
            parameter: None,
            fallback: None,
        },
        Optimizations::default(),
        Expr::Undefined,
    );

    let out = translate(&mut comp, call(None, &t, &m, vec![]));
    assert_eq!(out, Expr::int(42));
    assert_eq!(comp.warnings().len(), 1);
}

struct NeedsTypeMacro;

impl Macro for NeedsTypeMacro {
    fn translate_call(&mut self, _call: MacroCall<'_>) -> MacroResult {
        MacroResult::NeedsResolvedTypeArg(Type::Param(0))
    }
}

#[test]
fn test_unresolved_type_arg_outside_inline_mentions_translate_call() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("tm", 0);
    let macro_ty = ty("NeedsTypeMacro");
    comp.register_macro(macro_ty.clone(), Box::new(NeedsTypeMacro));
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Macro {
            macro_type: macro_ty,
            parameter: None,
            fallback: None,
        },
        Optimizations::default(),
        Expr::Undefined,
    );

    let out = translate(&mut comp, call(None, &t, &m, vec![]));
    assert_eq!(out, Expr::error_placeholder());
    assert!(comp.errors().iter().any(|d| match &d.error {
        TranslationError::SourceError(msg) => msg.contains("TranslateCall"),
        _ => false,
    }));
}

struct PanickyMacro;

impl Macro for PanickyMacro {
    fn translate_call(&mut self, _call: MacroCall<'_>) -> MacroResult {
        panic!("macro exploded");
    }
}

#[test]
fn test_macro_panic_becomes_macro_error() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("pm", 0);
    let macro_ty = ty("PanickyMacro");
    comp.register_macro(macro_ty.clone(), Box::new(PanickyMacro));
    comp.add_compiled_method(
        t.clone(),
        m.clone(),
        Member::Macro {
            macro_type: macro_ty,
            parameter: None,
            fallback: None,
        },
        Optimizations::default(),
        Expr::Undefined,
    );

    let out = translate(&mut comp, call(None, &t, &m, vec![]));
    assert_eq!(out, Expr::error_placeholder());
    assert!(comp.errors().iter().any(|d| match &d.error {
        TranslationError::MacroError { message, .. } => message.contains("macro exploded"),
        _ => false,
    }));
}

#[test]
fn test_static_field_triggers_cctor() {
    let mut comp = Compilation::new();
    let t = ty("S");
    let info = quill_metadata::ClassInfo {
        address: Some(Address::global(["S"])),
        static_constructor: Some(Address::global(["S", "$cctor"])),
        fields: {
            let mut f = rustc_hash::FxHashMap::default();
            f.insert(
                "F".to_string(),
                quill_metadata::FieldInfo {
                    kind: quill_metadata::FieldKind::Static(Address::global(["S", "F"])),
                    readonly: false,
                },
            );
            f
        },
        ..Default::default()
    };
    comp.add_class(t.clone(), info);

    let out = translate(
        &mut comp,
        Expr::FieldGet {
            this: None,
            ty: plain(t),
            field: "F".into(),
        },
    );
    assert_eq!(
        out,
        Expr::Sequential(vec![
            Expr::apply(Expr::global(["S", "$cctor"]), vec![]),
            Expr::global(["S", "F"]),
        ])
    );
}
