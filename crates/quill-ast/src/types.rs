//! Entity references and input-side types.
//!
//! Type, method, constructor and field identities are opaque structural
//! values supplied by the front-end; generic lists are positional.

use std::fmt;

/// Fully qualified identity of a type definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDef {
    pub assembly: String,
    pub name: String,
}

impl TypeDef {
    pub fn new(assembly: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            assembly: assembly.into(),
            name: name.into(),
        }
    }

    /// The sentinel definition standing for a dynamically typed object.
    pub fn is_dynamic(&self) -> bool {
        self.name == known::DYNAMIC_NAME
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Identity of a method: name plus full signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<Type>,
    pub returns: Type,
    /// Number of method-level generic parameters
    pub generics: usize,
}

impl MethodDef {
    pub fn new(name: impl Into<String>, params: Vec<Type>, returns: Type) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            generics: 0,
        }
    }
}

impl fmt::Display for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") : {}", self.returns)
    }
}

/// Identity of a constructor: its parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorDef {
    pub params: Vec<Type>,
}

impl ConstructorDef {
    pub fn new(params: Vec<Type>) -> Self {
        Self { params }
    }
}

impl fmt::Display for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".ctor(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

/// An entity together with its positional generic instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Concrete<T> {
    pub entity: T,
    pub generics: Vec<Type>,
}

impl<T> Concrete<T> {
    pub fn new(entity: T, generics: Vec<Type>) -> Self {
        Self { entity, generics }
    }

    /// An instantiation with no generic arguments.
    pub fn plain(entity: T) -> Self {
        Self {
            entity,
            generics: Vec::new(),
        }
    }
}

/// Input-side type shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A named definition with generic arguments
    Concrete(Concrete<TypeDef>),
    /// A generic parameter, positional over the concatenated
    /// type-then-method generic list
    Param(usize),
    /// An array type with the given rank
    Array(Box<Type>, usize),
    /// A tuple type
    Tuple(Vec<Type>),
    /// A curried function type
    Fun(Box<Type>, Box<Type>),
    Void,
    Dynamic,
}

impl Type {
    pub fn concrete(def: TypeDef) -> Self {
        Type::Concrete(Concrete::plain(def))
    }

    /// Whether any generic parameter occurs in this type.
    pub fn contains_param(&self) -> bool {
        match self {
            Type::Param(_) => true,
            Type::Concrete(c) => c.generics.iter().any(Type::contains_param),
            Type::Array(e, _) => e.contains_param(),
            Type::Tuple(es) => es.iter().any(Type::contains_param),
            Type::Fun(a, r) => a.contains_param() || r.contains_param(),
            Type::Void | Type::Dynamic => false,
        }
    }

    /// Substitute positional generic parameters with `generics`.
    /// Parameters without a supplied argument are left in place.
    pub fn substitute(&self, generics: &[Type]) -> Type {
        match self {
            Type::Param(i) => generics.get(*i).cloned().unwrap_or(Type::Param(*i)),
            Type::Concrete(c) => Type::Concrete(Concrete::new(
                c.entity.clone(),
                c.generics.iter().map(|t| t.substitute(generics)).collect(),
            )),
            Type::Array(e, rank) => Type::Array(Box::new(e.substitute(generics)), *rank),
            Type::Tuple(es) => Type::Tuple(es.iter().map(|t| t.substitute(generics)).collect()),
            Type::Fun(a, r) => Type::Fun(
                Box::new(a.substitute(generics)),
                Box::new(r.substitute(generics)),
            ),
            Type::Void => Type::Void,
            Type::Dynamic => Type::Dynamic,
        }
    }

    /// Collect every type definition mentioned in this type.
    pub fn collect_type_defs(&self, out: &mut Vec<TypeDef>) {
        match self {
            Type::Concrete(c) => {
                out.push(c.entity.clone());
                for g in &c.generics {
                    g.collect_type_defs(out);
                }
            }
            Type::Array(e, _) => e.collect_type_defs(out),
            Type::Tuple(es) => {
                for e in es {
                    e.collect_type_defs(out);
                }
            }
            Type::Fun(a, r) => {
                a.collect_type_defs(out);
                r.collect_type_defs(out);
            }
            Type::Param(_) | Type::Void | Type::Dynamic => {}
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Concrete(c) => {
                write!(f, "{}", c.entity)?;
                if !c.generics.is_empty() {
                    write!(f, "<")?;
                    for (i, g) in c.generics.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", g)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Param(i) => write!(f, "'T{}", i),
            Type::Array(e, 1) => write!(f, "{}[]", e),
            Type::Array(e, rank) => write!(f, "{}[{}]", e, ",".repeat(rank - 1)),
            Type::Tuple(es) => {
                write!(f, "(")?;
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        write!(f, " * ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Type::Fun(a, r) => write!(f, "({} -> {})", a, r),
            Type::Void => write!(f, "unit"),
            Type::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A global path, stored innermost segment first.
///
/// `Address::global(["N", "M"])` names the global `N.M`; the reversed
/// storage makes prefix sharing and parent extraction cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    segments: Vec<String>,
}

impl Address {
    /// The global root (`globalThis`).
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Build from segments in emission order.
    pub fn global<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments: Vec<String> = path.into_iter().map(Into::into).collect();
        segments.reverse();
        Self { segments }
    }

    /// Build from segments stored innermost-first.
    pub fn from_reversed(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Segments innermost-first.
    pub fn reversed(&self) -> &[String] {
        &self.segments
    }

    /// Segments in emission order (outermost first).
    pub fn emission_order(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().rev().map(String::as_str)
    }

    /// The address of a member under this one.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.insert(0, name.into());
        Self { segments }
    }

    /// Split into the innermost name and the enclosing address.
    pub fn split_last(&self) -> Option<(&str, Address)> {
        let (name, rest) = self.segments.split_first()?;
        Some((
            name.as_str(),
            Address {
                segments: rest.to_vec(),
            },
        ))
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for s in self.emission_order() {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", s)?;
            first = false;
        }
        Ok(())
    }
}

/// Well-known type definitions the translator special-cases.
pub mod known {
    use super::{MethodDef, Type, TypeDef};

    pub(super) const DYNAMIC_NAME: &str = "dynamic";

    /// The dynamic-object sentinel.
    pub fn dynamic() -> TypeDef {
        TypeDef::new("", DYNAMIC_NAME)
    }

    pub fn object() -> TypeDef {
        TypeDef::new("netstandard", "System.Object")
    }

    pub fn string() -> TypeDef {
        TypeDef::new("netstandard", "System.String")
    }

    pub fn char() -> TypeDef {
        TypeDef::new("netstandard", "System.Char")
    }

    pub fn bool() -> TypeDef {
        TypeDef::new("netstandard", "System.Boolean")
    }

    pub fn unit() -> TypeDef {
        TypeDef::new("FSharp.Core", "Microsoft.FSharp.Core.Unit")
    }

    pub fn void() -> TypeDef {
        TypeDef::new("netstandard", "System.Void")
    }

    pub fn exception() -> TypeDef {
        TypeDef::new("netstandard", "System.Exception")
    }

    pub fn array() -> TypeDef {
        TypeDef::new("netstandard", "System.Array")
    }

    pub fn disposable() -> TypeDef {
        TypeDef::new("netstandard", "System.IDisposable")
    }

    pub fn optional() -> TypeDef {
        TypeDef::new("FSharp.Core", "Microsoft.FSharp.Core.FSharpOption`1")
    }

    /// The abstract provider every remote call is dispatched through.
    pub fn remoting_provider() -> TypeDef {
        TypeDef::new("quill", "Quill.Remoting.IRemotingProvider")
    }

    /// The abstract provider method for a remoting kind.
    pub fn remoting_method(name: &str) -> MethodDef {
        MethodDef::new(name, vec![Type::Dynamic, Type::Dynamic], Type::Dynamic)
    }

    /// Numeric definitions all mapping to the JavaScript `number` type.
    pub fn is_number(def: &TypeDef) -> bool {
        matches!(
            def.name.as_str(),
            "System.SByte"
                | "System.Byte"
                | "System.Int16"
                | "System.UInt16"
                | "System.Int32"
                | "System.UInt32"
                | "System.Int64"
                | "System.UInt64"
                | "System.Single"
                | "System.Double"
                | "System.Decimal"
        )
    }

    /// Definitions tested with `typeof`, and the string they test against.
    pub fn type_of_test(def: &TypeDef) -> Option<&'static str> {
        if is_number(def) {
            return Some("number");
        }
        match def.name.as_str() {
            "System.String" | "System.Char" => Some("string"),
            "System.Boolean" => Some("boolean"),
            "System.Object" => Some("object"),
            _ => None,
        }
    }

    /// Definitions mapped to a built-in prototype for `instanceof` tests.
    pub fn instance_of_global(def: &TypeDef) -> Option<&'static str> {
        match def.name.as_str() {
            "System.Exception" => Some("Error"),
            "System.Array" => Some("Array"),
            _ => None,
        }
    }

    pub fn is_unit(def: &TypeDef) -> bool {
        matches!(
            def.name.as_str(),
            "Microsoft.FSharp.Core.Unit" | "System.Void"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_round_trip() {
        let a = Address::global(["N", "M"]);
        assert_eq!(a.reversed(), &["M".to_string(), "N".to_string()]);
        assert_eq!(a.to_string(), "N.M");
        let (name, parent) = a.split_last().unwrap();
        assert_eq!(name, "M");
        assert_eq!(parent.to_string(), "N");
    }

    #[test]
    fn test_address_child() {
        let a = Address::global(["N"]).child("C").child("prototype");
        assert_eq!(a.to_string(), "N.C.prototype");
    }

    #[test]
    fn test_type_substitute() {
        let t = Type::Fun(
            Box::new(Type::Param(0)),
            Box::new(Type::Array(Box::new(Type::Param(1)), 1)),
        );
        let s = t.substitute(&[Type::concrete(known::string()), Type::Void]);
        assert_eq!(
            s,
            Type::Fun(
                Box::new(Type::concrete(known::string())),
                Box::new(Type::Array(Box::new(Type::Void), 1)),
            )
        );
    }

    #[test]
    fn test_contains_param() {
        let t = Type::Tuple(vec![Type::Void, Type::Param(2)]);
        assert!(t.contains_param());
        assert!(!Type::concrete(known::object()).contains_param());
    }
}
