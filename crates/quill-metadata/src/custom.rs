//! Descriptors for compiler-synthesized type shapes.
//!
//! A custom type has no explicitly compiled members; the translator
//! synthesizes field accessors, case constructors and tests from the
//! descriptor instead.

use quill_ast::{Literal, Type};

/// The shape of a custom type.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomTypeInfo {
    Delegate(DelegateInfo),
    Record(Vec<RecordFieldInfo>),
    Union(UnionInfo),
    /// A union whose runtime representation is the underlying case value;
    /// the tag is reconstructed by type inspection in declaration order
    ErasedUnion(Vec<ErasedUnionCase>),
    Struct,
}

/// Signature of a delegate type.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateInfo {
    pub params: Vec<Type>,
    pub returns: Type,
}

/// A record field and its JavaScript encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFieldInfo {
    pub name: String,
    pub js_name: String,
    pub optional: bool,
    pub mutable: bool,
}

impl RecordFieldInfo {
    pub fn new(name: impl Into<String>, js_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            js_name: js_name.into(),
            optional: false,
            mutable: false,
        }
    }
}

/// A tagged union.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionInfo {
    pub cases: Vec<UnionCaseInfo>,
}

impl UnionInfo {
    /// Position of a case by name.
    pub fn case_index(&self, name: &str) -> Option<usize> {
        self.cases.iter().position(|c| c.name == name)
    }

    /// Whether the union has a single case and needs no tag.
    pub fn is_single_case(&self) -> bool {
        self.cases.len() == 1
    }

    /// For two-case unions where one case is the `null` constant,
    /// the indices `(null_case, value_case)`.
    pub fn null_pair(&self) -> Option<(usize, usize)> {
        if self.cases.len() != 2 {
            return None;
        }
        let null_at = self
            .cases
            .iter()
            .position(|c| matches!(c.kind, UnionCaseKind::Constant(Literal::Null)))?;
        Some((null_at, 1 - null_at))
    }

    /// Whether case objects carry a `$` tag field.
    pub fn has_tag(&self) -> bool {
        !self.is_single_case() && self.null_pair().is_none()
    }
}

/// One case of a tagged union.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionCaseInfo {
    pub name: String,
    pub kind: UnionCaseKind,
}

/// Runtime encoding of a union case.
#[derive(Debug, Clone, PartialEq)]
pub enum UnionCaseKind {
    /// Fields stored under `$0`, `$1`, …
    Normal(Vec<String>),
    /// Represented by a constant value
    Constant(Literal),
    /// A shared instance stored on the union's address
    Singleton,
}

/// One case of an erased union.
#[derive(Debug, Clone, PartialEq)]
pub struct ErasedUnionCase {
    pub name: String,
    pub ty: Type,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn union(cases: Vec<UnionCaseInfo>) -> UnionInfo {
        UnionInfo { cases }
    }

    fn normal(name: &str, fields: &[&str]) -> UnionCaseInfo {
        UnionCaseInfo {
            name: name.into(),
            kind: UnionCaseKind::Normal(fields.iter().map(|f| f.to_string()).collect()),
        }
    }

    #[test]
    fn test_null_pair_detection() {
        let u = union(vec![
            UnionCaseInfo {
                name: "None".into(),
                kind: UnionCaseKind::Constant(Literal::Null),
            },
            normal("Some", &["Value"]),
        ]);
        assert_eq!(u.null_pair(), Some((0, 1)));
        assert!(!u.has_tag());
    }

    #[test]
    fn test_multi_case_has_tag() {
        let u = union(vec![
            normal("A", &["Item"]),
            UnionCaseInfo {
                name: "B".into(),
                kind: UnionCaseKind::Singleton,
            },
        ]);
        assert!(u.has_tag());
        assert_eq!(u.case_index("B"), Some(1));
        assert_eq!(u.case_index("C"), None);
    }

    #[test]
    fn test_single_case_needs_no_tag() {
        let u = union(vec![normal("Only", &["Item"])]);
        assert!(u.is_single_case());
        assert!(!u.has_tag());
    }
}
