//! Quill Metadata - the compilation database
//!
//! Holds everything the translator queries and mutates while lowering
//! member bodies: per-class member tables with their compilation kinds,
//! custom-type descriptors, the work queue of members awaiting
//! translation, compiled results, diagnostics, the dependency graph and
//! the macro/generator plug-in registry.

pub mod custom;
pub mod error;
pub mod graph;
pub mod macros;
pub mod member;
pub mod store;

pub use custom::{
    CustomTypeInfo, DelegateInfo, ErasedUnionCase, RecordFieldInfo, UnionCaseInfo, UnionCaseKind,
    UnionInfo,
};
pub use error::{Diagnostic, TranslationError, Warning};
pub use graph::{DependencyGraph, Node};
pub use macros::{
    panic_message, Generator, GeneratorRequest, GeneratorResult, Macro, MacroCall, MacroCtor,
    MacroResult,
};
pub use member::{Member, Optimizations, RemotingKind};
pub use store::{
    AddressOrCustomType, ClassInfo, Compilation, CompiledMemberInfo, CompilingKind,
    CompilingMember, ConstructorLookup, FieldInfo, FieldKind, FieldLookup, GeneratorSpec,
    InterfaceInfo, LookupError, MethodLookup,
};
