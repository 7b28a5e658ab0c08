//! The expression IR.
//!
//! One arm per node kind. Input-side nodes (calls, constructors, union
//! cases, field accesses, type tests, trait calls) are eliminated by the
//! translator; the remainder is the JavaScript-compatible subset consumed
//! by the writer.

use crate::id::Id;
use crate::span::Span;
use crate::stmt::Statement;
use crate::types::{Address, Concrete, ConstructorDef, MethodDef, Type, TypeDef};

/// Constant values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
}

/// Effect classification used by let-removal and emission.
///
/// `Pure` expressions can be duplicated or reordered freely;
/// `NoSideEffect` expressions can be dropped but not moved across writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Purity {
    NonPure,
    NoSideEffect,
    Pure,
}

/// JavaScript unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
    Plus,
    BitNot,
    TypeOf,
    Void,
}

/// JavaScript binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    ZeroFillShr,
    InstanceOf,
    In,
}

/// Argument-shape adaptation a caller performs for a shaped parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncArgOptimization {
    NotOptimized,
    /// The parameter is received as a flat n-ary function instead of a
    /// chain of single-argument functions.
    Curried(usize),
    /// The parameter is received as a flat n-ary function instead of a
    /// function over an n-tuple.
    Tupled(usize),
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The JavaScript `undefined` value
    Undefined,
    This,
    /// The base-class receiver; only valid as a call target or base
    /// constructor receiver, rewritten away during translation
    Base,
    /// The enclosing class value inside members bound to a static
    /// constructor context; resolved against the translator's self address
    SelfAddress,
    Var(Id),
    VarSet(Id, Box<Expr>),
    Value(Literal),
    Application {
        target: Box<Expr>,
        args: Vec<Expr>,
        purity: Purity,
    },
    Function {
        params: Vec<Id>,
        body: Box<Statement>,
    },
    Let {
        var: Id,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    LetRec {
        bindings: Vec<(Id, Expr)>,
        body: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    Sequential(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    NewArray(Vec<Expr>),
    ItemGet {
        target: Box<Expr>,
        item: Box<Expr>,
        purity: Purity,
    },
    ItemSet {
        target: Box<Expr>,
        item: Box<Expr>,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    GlobalAccess(Address),
    New {
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Pre-formed JavaScript source, emitted verbatim by the writer
    Verbatim(String),
    /// Positional placeholder inside an inline body
    Hole(usize),
    Await(Box<Expr>),
    NamedParameter {
        name: String,
        value: Box<Expr>,
    },
    RefOrOutParameter(Box<Expr>),
    Coalesce {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    StatementExpr {
        statement: Box<Statement>,
        result: Option<Id>,
    },
    /// An argument pre-adapted to a shaped parameter; the inner
    /// expression is the flat form
    OptimizedClosure {
        expr: Box<Expr>,
        shape: FuncArgOptimization,
    },
    WithSpan {
        span: Span,
        expr: Box<Expr>,
    },
    Call {
        this: Option<Box<Expr>>,
        ty: Concrete<TypeDef>,
        method: Concrete<MethodDef>,
        args: Vec<Expr>,
    },
    Ctor {
        ty: Concrete<TypeDef>,
        ctor: ConstructorDef,
        args: Vec<Expr>,
    },
    BaseCtor {
        this: Box<Expr>,
        ty: Concrete<TypeDef>,
        ctor: ConstructorDef,
        args: Vec<Expr>,
    },
    /// An object whose prototype the writer wires to the given class
    CopyCtor {
        ty: TypeDef,
        object: Box<Expr>,
    },
    /// Static-constructor trigger for the given type
    Cctor(TypeDef),
    NewDelegate {
        this: Option<Box<Expr>>,
        ty: Concrete<TypeDef>,
        method: Concrete<MethodDef>,
    },
    NewRecord {
        ty: Concrete<TypeDef>,
        args: Vec<Expr>,
    },
    NewUnionCase {
        ty: Concrete<TypeDef>,
        case: String,
        args: Vec<Expr>,
    },
    UnionCaseTest {
        expr: Box<Expr>,
        ty: Concrete<TypeDef>,
        case: String,
    },
    UnionCaseGet {
        expr: Box<Expr>,
        ty: Concrete<TypeDef>,
        case: String,
        field: String,
    },
    UnionCaseTag {
        expr: Box<Expr>,
        ty: Concrete<TypeDef>,
    },
    FieldGet {
        this: Option<Box<Expr>>,
        ty: Concrete<TypeDef>,
        field: String,
    },
    FieldSet {
        this: Option<Box<Expr>>,
        ty: Concrete<TypeDef>,
        field: String,
        value: Box<Expr>,
    },
    TypeCheck {
        expr: Box<Expr>,
        ty: Type,
    },
    TraitCall {
        this: Option<Box<Expr>>,
        types: Vec<Concrete<TypeDef>>,
        method: Concrete<MethodDef>,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// The expression substituted for every failed translation.
    pub fn error_placeholder() -> Expr {
        Expr::Value(Literal::String("$$ERROR$$".into()))
    }

    pub fn str(s: impl Into<String>) -> Expr {
        Expr::Value(Literal::String(s.into()))
    }

    pub fn int(i: i64) -> Expr {
        Expr::Value(Literal::Int(i))
    }

    pub fn bool(b: bool) -> Expr {
        Expr::Value(Literal::Bool(b))
    }

    pub fn global<I, S>(path: I) -> Expr
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::GlobalAccess(Address::global(path))
    }

    /// A non-pure application.
    pub fn apply(target: Expr, args: Vec<Expr>) -> Expr {
        Expr::Application {
            target: Box::new(target),
            args,
            purity: Purity::NonPure,
        }
    }

    /// Property access by constant name.
    pub fn item(target: Expr, name: impl Into<String>, purity: Purity) -> Expr {
        Expr::ItemGet {
            target: Box::new(target),
            item: Box::new(Expr::str(name)),
            purity,
        }
    }

    pub fn conditional(condition: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::Conditional {
            condition: Box::new(condition),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, expr: Expr) -> Expr {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn let_in(var: Id, value: Expr, body: Expr) -> Expr {
        Expr::Let {
            var,
            value: Box::new(value),
            body: Box::new(body),
        }
    }

    pub fn lambda(params: Vec<Id>, body: Statement) -> Expr {
        Expr::Function {
            params,
            body: Box::new(body),
        }
    }

    /// The node with any number of span wrappers removed.
    pub fn strip_span(&self) -> &Expr {
        let mut cur = self;
        while let Expr::WithSpan { expr, .. } = cur {
            cur = expr;
        }
        cur
    }

    /// Effect classification of this expression tree.
    pub fn purity(&self) -> Purity {
        use Purity::*;
        match self {
            Expr::Undefined
            | Expr::This
            | Expr::SelfAddress
            | Expr::Value(_)
            | Expr::GlobalAccess(_)
            | Expr::Hole(_)
            | Expr::Function { .. } => Pure,
            Expr::Var(id) => {
                if id.is_mutable() {
                    NoSideEffect
                } else {
                    Pure
                }
            }
            Expr::Application {
                target,
                args,
                purity,
            } => {
                let mut p = *purity;
                p = p.min(target.purity());
                for a in args {
                    p = p.min(a.purity());
                }
                p
            }
            Expr::ItemGet {
                target,
                item,
                purity,
            } => (*purity).min(target.purity()).min(item.purity()),
            Expr::Unary { expr, .. } => expr.purity(),
            Expr::Binary { left, right, .. } => left.purity().min(right.purity()),
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => condition
                .purity()
                .min(if_true.purity())
                .min(if_false.purity()),
            Expr::Sequential(es) => es.iter().map(Expr::purity).min().unwrap_or(Pure),
            Expr::Object(fields) => fields
                .iter()
                .map(|(_, e)| e.purity())
                .min()
                .unwrap_or(Pure)
                .min(NoSideEffect),
            Expr::NewArray(es) => es
                .iter()
                .map(Expr::purity)
                .min()
                .unwrap_or(Pure)
                .min(NoSideEffect),
            Expr::Let { value, body, .. } => value.purity().min(body.purity()),
            Expr::LetRec { bindings, body } => bindings
                .iter()
                .map(|(_, e)| e.purity())
                .min()
                .unwrap_or(Pure)
                .min(body.purity()),
            Expr::OptimizedClosure { expr, .. } => expr.purity(),
            Expr::WithSpan { expr, .. } => expr.purity(),
            _ => NonPure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purity_of_values() {
        assert_eq!(Expr::int(1).purity(), Purity::Pure);
        assert_eq!(Expr::Undefined.purity(), Purity::Pure);
        assert_eq!(
            Expr::apply(Expr::global(["f"]), vec![]).purity(),
            Purity::NonPure
        );
    }

    #[test]
    fn test_purity_of_mutable_var_read() {
        let m = Id::named_mut("m");
        assert_eq!(Expr::Var(m).purity(), Purity::NoSideEffect);
        let i = Id::named("i");
        assert_eq!(Expr::Var(i).purity(), Purity::Pure);
    }

    #[test]
    fn test_purity_propagates_through_operators() {
        let e = Expr::binary(
            Expr::int(1),
            BinaryOperator::Add,
            Expr::apply(Expr::global(["f"]), vec![]),
        );
        assert_eq!(e.purity(), Purity::NonPure);
    }

    #[test]
    fn test_strip_span() {
        let inner = Expr::int(1);
        let wrapped = Expr::WithSpan {
            span: crate::Span::new(0, 1, 1, 1),
            expr: Box::new(inner.clone()),
        };
        assert_eq!(wrapped.strip_span(), &inner);
    }
}
