//! Binding identifiers.
//!
//! Identifiers are created fresh per binding and compare by their counter
//! value only, so two bindings with the same display name never collide.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A local binding identifier.
///
/// The mutability flag records whether the binding is ever assigned after
/// introduction; let-removal refuses to substitute mutable bindings.
#[derive(Debug, Clone)]
pub struct Id {
    id: u64,
    name: Option<String>,
    mutable: bool,
}

impl Id {
    /// Create a fresh anonymous identifier.
    pub fn fresh() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: None,
            mutable: false,
        }
    }

    /// Create a fresh identifier with a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: Some(name.into()),
            mutable: false,
        }
    }

    /// Create a fresh mutable identifier with a display name.
    pub fn named_mut(name: impl Into<String>) -> Self {
        Self {
            mutable: true,
            ..Self::named(name)
        }
    }

    /// A fresh identifier sharing this one's name and mutability.
    ///
    /// Used when splicing a body into a new context, so that repeated
    /// expansion of the same body never reuses a binding.
    pub fn refreshed(&self) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name.clone(),
            mutable: self.mutable,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Id {}

impl std::hash::Hash for Id {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(n) => write!(f, "{}${}", n, self.id),
            None => write!(f, "${}", self.id),
        }
    }
}
