//! Compilation-kind tags and per-member optimization records.

use quill_ast::{Address, FuncArgOptimization, Purity, TypeDef};

/// How calls to a member are emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// Dispatched through a receiver under the given property name
    Instance(String),
    /// A global call at the given address
    Static(Address),
    /// Constructs via `new` at the given address
    Constructor(Address),
    /// Body substituted at every call site; already compiled
    Inline,
    /// Body substituted after generic resolution, then compiled per site
    NotCompiledInline,
    /// Translation delegated to a macro plug-in
    Macro {
        macro_type: TypeDef,
        parameter: Option<String>,
        fallback: Option<Box<Member>>,
    },
    /// A call through a remoting provider
    Remote {
        kind: RemotingKind,
        handle: String,
        provider: Option<TypeDef>,
    },
}

impl Member {
    /// Whether calls substitute a body instead of dispatching.
    pub fn is_inline(&self) -> bool {
        matches!(self, Member::Inline | Member::NotCompiledInline)
    }
}

/// The shape of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemotingKind {
    Sync,
    Async,
    Task,
    Send,
}

impl RemotingKind {
    /// The provider method carrying this kind.
    pub fn method_name(&self) -> &'static str {
        match self {
            RemotingKind::Sync => "Sync",
            RemotingKind::Async => "Async",
            RemotingKind::Task => "Task",
            RemotingKind::Send => "Send",
        }
    }
}

/// Per-member optimization facts consulted at call sites.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimizations {
    /// Per-argument shape adaptation the caller must perform
    pub func_args: Option<Vec<FuncArgOptimization>>,
    pub purity: Purity,
    /// Warning reported at every call site
    pub warn: Option<String>,
}

impl Optimizations {
    pub fn is_pure(&self) -> bool {
        self.purity == Purity::Pure
    }
}

impl Default for Optimizations {
    fn default() -> Self {
        Self {
            func_args: None,
            purity: Purity::NonPure,
            warn: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_kinds() {
        assert!(Member::Inline.is_inline());
        assert!(Member::NotCompiledInline.is_inline());
        assert!(!Member::Instance("m".into()).is_inline());
        assert!(!Member::Static(Address::global(["N", "f"])).is_inline());
    }

    #[test]
    fn test_default_optimizations_are_impure() {
        let o = Optimizations::default();
        assert!(!o.is_pure());
        assert!(o.func_args.is_none());
    }
}
