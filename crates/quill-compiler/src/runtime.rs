//! Addresses of the runtime support library.
//!
//! The translator and the optimization passes emit calls to these
//! helpers; the writer resolves them against the bundled runtime module.

use quill_ast::{Address, Expr};

const RUNTIME_ROOT: &str = "Runtime";

/// Names of runtime helpers referenced by emitted code.
pub mod helpers {
    /// `Curried(f, n)` - wrap a flat n-ary function as a curried chain
    pub const CURRIED: &str = "Curried";
    pub const CURRIED2: &str = "Curried2";
    pub const CURRIED3: &str = "Curried3";
    /// `CurriedA(f, m, [a...])` - curried wrapper with m pre-applied args
    pub const CURRIED_A: &str = "CurriedA";
    /// `Tupled(f)` - wrap a flat n-ary function as a function over a tuple
    pub const TUPLED: &str = "Tupled";
    pub const BIND_DELEGATE: &str = "BindDelegate";
    pub const COMBINE_DELEGATES: &str = "CombineDelegates";
    pub const DELEGATE_EQUAL: &str = "DelegateEqual";
    pub const GET_OPTIONAL: &str = "GetOptional";
    pub const SET_OPTIONAL: &str = "SetOptional";
    pub const DELETE_EMPTY_FIELDS: &str = "DeleteEmptyFields";
}

/// The address of a runtime helper.
pub fn address(name: &str) -> Address {
    Address::global([RUNTIME_ROOT, name])
}

/// A reference to a runtime helper.
pub fn global(name: &str) -> Expr {
    Expr::GlobalAccess(address(name))
}

/// Whether `expr` is a reference to the given runtime helper.
pub fn is_helper(expr: &Expr, name: &str) -> bool {
    matches!(expr.strip_span(), Expr::GlobalAccess(a) if *a == address(name))
}

/// The default provider object remote calls go through when the member
/// does not declare one.
pub fn default_remoting_provider() -> Expr {
    Expr::GlobalAccess(Address::global(["Remoting"]))
}
