//! Shared harness for the translation tests.
//!
//! Wires minimal metadata by hand and exposes helpers to translate a
//! single expression in the context of a synthetic caller, or to run the
//! whole driver and fetch compiled bodies back.

#![allow(dead_code)]

use quill_ast::{
    Address, Concrete, ConstructorDef, Expr, MethodDef, Transformer, Type, TypeDef,
};
use quill_compiler::{compile, CompilerOptions, Translator};
use quill_metadata::{
    ClassInfo, Compilation, CompilingMember, Member, MethodLookup, Node, Optimizations,
};

pub fn ty(name: &str) -> TypeDef {
    TypeDef::new("test", name)
}

pub fn method(name: &str, arity: usize) -> MethodDef {
    MethodDef::new(name, vec![Type::Dynamic; arity], Type::Dynamic)
}

pub fn ctor(arity: usize) -> ConstructorDef {
    ConstructorDef::new(vec![Type::Dynamic; arity])
}

pub fn plain<T>(entity: T) -> Concrete<T> {
    Concrete::plain(entity)
}

/// The synthetic member every single-expression translation runs under.
pub fn caller() -> Node {
    Node::Method(ty("Caller"), method("run", 0))
}

/// Register a class with a global address.
pub fn class_at(comp: &mut Compilation, td: &TypeDef, path: &[&str]) {
    let info = ClassInfo {
        address: Some(Address::global(path.iter().copied())),
        has_prototype: true,
        ..ClassInfo::default()
    };
    comp.add_class(td.clone(), info);
}

/// Register an already compiled static method at the given address.
pub fn static_method(comp: &mut Compilation, td: &TypeDef, m: &MethodDef, path: &[&str]) {
    comp.add_compiled_method(
        td.clone(),
        m.clone(),
        Member::Static(Address::global(path.iter().copied())),
        Optimizations::default(),
        Expr::Undefined,
    );
}

/// Register an already compiled instance method under a property name.
pub fn instance_method(comp: &mut Compilation, td: &TypeDef, m: &MethodDef, name: &str) {
    comp.add_compiled_method(
        td.clone(),
        m.clone(),
        Member::Instance(name.into()),
        Optimizations::default(),
        Expr::Undefined,
    );
}

/// Register an already compiled inline method with a hole-form body.
pub fn inline_method(comp: &mut Compilation, td: &TypeDef, m: &MethodDef, body: Expr) {
    comp.add_compiled_method(
        td.clone(),
        m.clone(),
        Member::Inline,
        Optimizations::default(),
        body,
    );
}

/// Translate one expression bound to the synthetic caller; the
/// optimization chain is not applied.
pub fn translate(comp: &mut Compilation, expr: Expr) -> Expr {
    let options = CompilerOptions::default();
    let mut tr = Translator::new(comp, &options, caller());
    tr.transform_expr(expr)
}

/// Run the driver over everything queued.
pub fn run(comp: &mut Compilation) {
    compile(comp, &CompilerOptions::default());
}

/// Fetch a compiled method body back out of the database.
pub fn compiled_body(comp: &Compilation, td: &TypeDef, m: &MethodDef) -> Expr {
    match comp.lookup_method(td, m) {
        MethodLookup::Compiled { body: Some(b), .. } => b,
        other => panic!("expected compiled body, got {:?}", other),
    }
}

/// Enqueue a static method for compilation whose body returns `expr`.
pub fn queue_static_method(
    comp: &mut Compilation,
    td: &TypeDef,
    m: &MethodDef,
    path: &[&str],
    body: Expr,
) {
    comp.add_compiling(CompilingMember::method(
        td.clone(),
        m.clone(),
        Member::Static(Address::global(path.iter().copied())),
        body,
    ));
}

/// A `fn () { return expr; }` body for queued members.
pub fn thunk(expr: Expr) -> Expr {
    Expr::lambda(vec![], quill_ast::Statement::Return(expr))
}

/// Unwrap `fn () { return e; }` back to `e`.
pub fn returned(body: &Expr) -> &Expr {
    match body {
        Expr::Function { body, .. } => match body.as_ref().strip_span() {
            quill_ast::Statement::Return(e) => e,
            other => panic!("expected return, got {:?}", other),
        },
        other => panic!("expected function, got {:?}", other),
    }
}
