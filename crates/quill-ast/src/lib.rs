//! Quill AST - Shared IR for the JavaScript back-end
//!
//! This crate defines the expression/statement IR that the translator
//! consumes and produces. The input side carries typed .NET-style nodes
//! (calls, constructors, union cases, field accesses, type tests); the
//! output side is the JavaScript-compatible subset (applications, item
//! accesses, operators, globals). Both live in the same sum type so the
//! translation can proceed node by node.

pub mod expr;
pub mod id;
pub mod span;
pub mod stmt;
pub mod transform;
pub mod types;

pub use expr::{
    BinaryOperator, Expr, FuncArgOptimization, Literal, Purity, UnaryOperator,
};
pub use id::Id;
pub use span::Span;
pub use stmt::{Statement, SwitchCase};
pub use transform::{count_var_uses, is_assigned_in, remove_spans, Transformer, Visitor};
pub use types::{known, Address, Concrete, ConstructorDef, MethodDef, Type, TypeDef};
