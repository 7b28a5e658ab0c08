//! Quill Compiler - the translation pipeline
//!
//! Lowers typed method, constructor and static-initializer bodies from
//! the input IR into the JavaScript IR, resolving every call through the
//! metadata database. The pipeline is:
//!
//! 1. The driver pulls a compiling member from the database.
//! 2. A `Translator` instance bound to that member rewrites its body,
//!    dispatching each node on its kind and on metadata lookups, and
//!    recording dependency edges as a side effect.
//! 3. The optimization chain runs in fixed order (let-removal, runtime
//!    cleaner, statement breaker, forced cleaner, curried collector; a
//!    shorter chain for inline bodies).
//! 4. The result is stored back as a compiled member.
//!
//! All failures surface through the diagnostics sinks; the output tree
//! carries the error placeholder where translation could not proceed.

pub mod driver;
pub mod optimize;
pub mod runtime;
pub mod subst;
pub mod translate;

pub use driver::{compile, CompilerOptions};
pub use subst::{GenericInlineResolver, Substitution};
pub use translate::Translator;
