//! The macro and generator plug-in surface.
//!
//! Macros customize the translation of particular calls or constructors;
//! generators produce whole member bodies. Both are registered on the
//! compilation under the type definition that names them, and both are
//! invoked behind a panic boundary by the host.

use crate::store::CompilingMember;
use crate::Node;
use quill_ast::{Concrete, ConstructorDef, Expr, MethodDef, Type, TypeDef};

/// A call a macro is asked to translate.
#[derive(Debug)]
pub struct MacroCall<'a> {
    pub this: Option<&'a Expr>,
    pub ty: &'a Concrete<TypeDef>,
    pub method: &'a Concrete<MethodDef>,
    pub args: &'a [Expr],
    /// The parameter stored with the member's macro annotation
    pub parameter: Option<&'a str>,
    /// Whether translation is happening inside an inline body
    pub is_inline: bool,
}

/// A constructor call a macro is asked to translate.
#[derive(Debug)]
pub struct MacroCtor<'a> {
    pub ty: &'a Concrete<TypeDef>,
    pub ctor: &'a ConstructorDef,
    pub args: &'a [Expr],
    pub parameter: Option<&'a str>,
    pub is_inline: bool,
}

/// Result protocol of a macro invocation, interpreted recursively.
#[derive(Debug)]
pub enum MacroResult {
    /// Translate this expression in place of the call
    Ok(Expr),
    /// Record a warning, continue with the inner result
    Warning(String, Box<MacroResult>),
    /// Record an error, emit the error placeholder
    Error(String),
    /// Record dependency edges, continue with the inner result
    Dependencies(Vec<Node>, Box<MacroResult>),
    /// Dispatch to the member's fallback compilation, if any
    Fallback,
    /// The macro needs the given type resolved before it can translate
    NeedsResolvedTypeArg(Type),
}

/// A user-supplied translation plug-in for calls and constructors.
pub trait Macro {
    fn translate_call(&mut self, call: MacroCall<'_>) -> MacroResult;

    fn translate_ctor(&mut self, ctor: MacroCtor<'_>) -> MacroResult {
        let _ = ctor;
        MacroResult::Error("This macro does not support constructors".into())
    }

    /// Called once per drain cycle; may hand back new members to compile.
    fn close(&mut self) -> Vec<CompilingMember> {
        Vec::new()
    }
}

/// A member body requested from a generator.
#[derive(Debug)]
pub struct GeneratorRequest<'a> {
    pub ty: &'a TypeDef,
    /// Display name of the member being generated
    pub name: &'a str,
    pub parameter: Option<&'a str>,
}

/// Result protocol of a generator invocation.
#[derive(Debug)]
pub enum GeneratorResult {
    /// An input-IR body, translated after generation
    Expr(Expr),
    /// Pre-formed JavaScript source, emitted verbatim
    Source(String),
    /// A plain string literal body
    Text(String),
    Error(String),
}

/// A user-supplied body generator.
pub trait Generator {
    fn generate(&mut self, request: GeneratorRequest<'_>) -> GeneratorResult;
}

/// Extract a readable message from a plug-in panic payload.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "plug-in panicked".to_string()
    }
}
