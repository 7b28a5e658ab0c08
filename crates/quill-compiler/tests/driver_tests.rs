//! Whole-pipeline runs through the driver.

mod common;

use common::*;
use quill_ast::{
    Address, BinaryOperator, Expr, Id, Statement, Type,
};
use quill_metadata::{
    Compilation, CompilingMember, LookupError, Macro, MacroCall, MacroResult, Member,
    MethodLookup, Node, TranslationError,
};

fn call0(td: &quill_ast::TypeDef, m: &quill_ast::MethodDef) -> Expr {
    Expr::Call {
        this: None,
        ty: plain(td.clone()),
        method: plain(m.clone()),
        args: vec![],
    }
}

#[test]
fn test_static_method_compiles_to_function_body() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("M", 1);
    let x = Id::named("x");
    queue_static_method(
        &mut comp,
        &t,
        &m,
        &["N", "M"],
        Expr::lambda(
            vec![x.clone()],
            Statement::Return(Expr::binary(
                Expr::Var(x),
                BinaryOperator::Add,
                Expr::int(1),
            )),
        ),
    );
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    let body = compiled_body(&comp, &t, &m);
    assert!(matches!(body, Expr::Function { ref params, .. } if params.len() == 1));
}

#[test]
fn test_call_to_queued_method_emits_final_shape() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("M", 1);
    let caller_ty = ty("C");
    let caller_m = method("run", 0);
    let x = Id::named("x");
    queue_static_method(
        &mut comp,
        &t,
        &m,
        &["N", "M"],
        Expr::lambda(
            vec![x.clone()],
            Statement::Return(Expr::binary(
                Expr::Var(x),
                BinaryOperator::Add,
                Expr::int(1),
            )),
        ),
    );
    queue_static_method(
        &mut comp,
        &caller_ty,
        &caller_m,
        &["C", "run"],
        thunk(Expr::Call {
            this: None,
            ty: plain(t.clone()),
            method: plain(m.clone()),
            args: vec![Expr::int(2)],
        }),
    );
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    let body = compiled_body(&comp, &caller_ty, &caller_m);
    assert_eq!(
        *returned(&body),
        Expr::apply(Expr::global(["N", "M"]), vec![Expr::int(2)])
    );
    assert!(comp.graph().unwrap().has_edge(
        &Node::Method(caller_ty, caller_m),
        &Node::Method(t, m)
    ));
}

#[test]
fn test_mutual_inline_recursion_fails_both_members() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let f = method("f", 0);
    let g = method("g", 0);
    comp.add_compiling(CompilingMember::method(
        t.clone(),
        f.clone(),
        Member::Inline,
        call0(&t, &g),
    ));
    comp.add_compiling(CompilingMember::method(
        t.clone(),
        g.clone(),
        Member::Inline,
        call0(&t, &f),
    ));
    run(&mut comp);

    let loop_errors: Vec<_> = comp
        .errors()
        .iter()
        .filter(|d| match &d.error {
            TranslationError::SourceError(m) => m.contains("Inline loop found at method"),
            _ => false,
        })
        .collect();
    assert_eq!(loop_errors.len(), 1, "errors: {:?}", comp.errors());
    assert!(comp.is_failed(&Node::Method(t.clone(), f.clone())));
    assert!(comp.is_failed(&Node::Method(t.clone(), g.clone())));
    assert!(matches!(
        comp.lookup_method(&t, &f),
        MethodLookup::Error(LookupError::Failed)
    ));
    assert!(matches!(
        comp.lookup_method(&t, &g),
        MethodLookup::Error(LookupError::Failed)
    ));
}

#[test]
fn test_queued_inline_is_compiled_on_demand() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let id_m = method("id", 1);
    let caller_ty = ty("C");
    let caller_m = method("run", 0);
    comp.add_compiling(CompilingMember::method(
        t.clone(),
        id_m.clone(),
        Member::Inline,
        Expr::Hole(0),
    ));
    queue_static_method(
        &mut comp,
        &caller_ty,
        &caller_m,
        &["C", "run"],
        thunk(Expr::Call {
            this: None,
            ty: plain(t.clone()),
            method: plain(id_m.clone()),
            args: vec![Expr::int(3)],
        }),
    );
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    let body = compiled_body(&comp, &caller_ty, &caller_m);
    assert_eq!(*returned(&body), Expr::int(3));
    // the inline member itself is stored compiled too
    assert!(matches!(
        comp.lookup_method(&t, &id_m),
        MethodLookup::Compiled {
            member: Member::Inline,
            ..
        }
    ));
}

#[test]
fn test_delayed_inline_is_demoted() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("check", 1);
    // a type test on a type parameter can only resolve per call site
    comp.add_compiling(CompilingMember::method(
        t.clone(),
        m.clone(),
        Member::Inline,
        Expr::TypeCheck {
            expr: Box::new(Expr::Hole(0)),
            ty: Type::Param(0),
        },
    ));
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    assert!(matches!(
        comp.lookup_method(&t, &m),
        MethodLookup::Compiled {
            member: Member::NotCompiledInline,
            ..
        }
    ));
}

struct EnqueueOnClose {
    target: quill_ast::TypeDef,
    emitted: bool,
}

impl Macro for EnqueueOnClose {
    fn translate_call(&mut self, _call: MacroCall<'_>) -> MacroResult {
        MacroResult::Ok(Expr::Undefined)
    }

    fn close(&mut self) -> Vec<CompilingMember> {
        if self.emitted {
            return Vec::new();
        }
        self.emitted = true;
        vec![CompilingMember::method(
            self.target.clone(),
            method("late", 0),
            Member::Static(Address::global(["T", "late"])),
            Expr::lambda(vec![], Statement::Return(Expr::int(9))),
        )]
    }
}

#[test]
fn test_macro_close_enqueues_members_for_second_drain() {
    let mut comp = Compilation::new();
    let t = ty("T");
    comp.register_macro(
        ty("Emitter"),
        Box::new(EnqueueOnClose {
            target: t.clone(),
            emitted: false,
        }),
    );
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    let late = method("late", 0);
    let body = compiled_body(&comp, &t, &late);
    assert_eq!(*returned(&body), Expr::int(9));
}

#[test]
fn test_entry_point_is_translated_as_statement() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("main", 0);
    static_method(&mut comp, &t, &m, &["T", "main"]);
    comp.set_entry_point(Statement::ExprStatement(call0(&t, &m)));
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    let ep = comp.compiled_entry_point().expect("entry point compiled");
    assert_eq!(
        *ep,
        Statement::ExprStatement(Expr::apply(Expr::global(["T", "main"]), vec![]))
    );
    assert!(comp.graph().unwrap().has_edge(
        &Node::EntryPoint,
        &Node::Method(t, m)
    ));
}

#[test]
fn test_compiled_bodies_contain_no_invalid_forms() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("M", 0);
    let x = Id::named("x");
    // a body whose translation leaves lets and sequentials behind
    queue_static_method(
        &mut comp,
        &t,
        &m,
        &["T", "M"],
        thunk(Expr::let_in(
            x.clone(),
            Expr::Sequential(vec![
                Expr::apply(Expr::global(["g"]), vec![]),
                Expr::int(1),
            ]),
            Expr::binary(Expr::Var(x), BinaryOperator::Add, Expr::int(2)),
        )),
    );
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    let body = compiled_body(&comp, &t, &m);
    assert!(quill_compiler::optimize::invalid_forms(&body, false).is_empty());
}

#[test]
fn test_recursive_static_method_compiles() {
    let mut comp = Compilation::new();
    let t = ty("T");
    let m = method("loop", 1);
    let x = Id::named("x");
    queue_static_method(
        &mut comp,
        &t,
        &m,
        &["T", "loop"],
        Expr::lambda(
            vec![x.clone()],
            Statement::Return(Expr::Call {
                this: None,
                ty: plain(t.clone()),
                method: plain(m.clone()),
                args: vec![Expr::Var(x)],
            }),
        ),
    );
    run(&mut comp);
    assert!(!comp.has_errors(), "errors: {:?}", comp.errors());
    let body = compiled_body(&comp, &t, &m);
    // the self-call resolves to the member's own address
    match returned(&body) {
        Expr::Application { target, .. } => {
            assert_eq!(**target, Expr::global(["T", "loop"]))
        }
        other => panic!("expected application, got {:?}", other),
    }
}
