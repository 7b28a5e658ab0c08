//! The inline-resolution engine.
//!
//! `Substitution` splices actual arguments and the receiver into an
//! inline body, α-renaming every binder so repeated expansion of the same
//! body never reuses a binding. `GenericInlineResolver` substitutes
//! positional generic arguments into every type mentioned by the body.

use quill_ast::{Concrete, Expr, Id, Transformer, Type, TypeDef};
use rustc_hash::FxHashMap;

/// Substitutes holes, named parameters and `this` in an inline body.
///
/// Source positions inside the body are stripped: the spliced code
/// belongs to the call site, not to the inline definition.
pub struct Substitution {
    args: Vec<Expr>,
    this: Option<Expr>,
    params: FxHashMap<Id, usize>,
    refreshed: FxHashMap<Id, Id>,
}

impl Substitution {
    /// Substitution for hole-indexed bodies.
    pub fn new(args: Vec<Expr>, this: Option<Expr>) -> Self {
        Self {
            args,
            this,
            params: FxHashMap::default(),
            refreshed: FxHashMap::default(),
        }
    }

    /// Substitution for bodies whose parameters occur as variables.
    pub fn with_params(params: &[Id], args: Vec<Expr>, this: Option<Expr>) -> Self {
        let mut map = FxHashMap::default();
        for (i, p) in params.iter().enumerate() {
            map.insert(p.clone(), i);
        }
        Self {
            args,
            this,
            params: map,
            refreshed: FxHashMap::default(),
        }
    }
}

impl Transformer for Substitution {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Hole(i) => self.args.get(i).cloned().unwrap_or(Expr::Undefined),
            Expr::This => self.this.clone().unwrap_or(Expr::This),
            Expr::Var(id) => {
                if let Some(&i) = self.params.get(&id) {
                    self.args.get(i).cloned().unwrap_or(Expr::Undefined)
                } else {
                    Expr::Var(self.transform_id(id))
                }
            }
            Expr::WithSpan { expr, .. } => self.transform_expr(*expr),
            other => self.transform_expr_parts(other),
        }
    }

    fn transform_id(&mut self, id: Id) -> Id {
        self.refreshed.get(&id).cloned().unwrap_or(id)
    }

    fn transform_binder(&mut self, id: Id) -> Id {
        let fresh = id.refreshed();
        self.refreshed.insert(id, fresh.clone());
        fresh
    }
}

/// Substitutes positional generic arguments into every type appearing
/// inside an inline body, so that nested metadata dispatches happen
/// against resolved types.
pub struct GenericInlineResolver {
    generics: Vec<Type>,
}

impl GenericInlineResolver {
    pub fn new(generics: Vec<Type>) -> Self {
        Self { generics }
    }

    fn resolve(&self, ty: Type) -> Type {
        ty.substitute(&self.generics)
    }

    fn resolve_concrete<T>(&self, c: Concrete<T>) -> Concrete<T> {
        Concrete {
            entity: c.entity,
            generics: c
                .generics
                .into_iter()
                .map(|t| t.substitute(&self.generics))
                .collect(),
        }
    }

    fn resolve_concretes(&self, cs: Vec<Concrete<TypeDef>>) -> Vec<Concrete<TypeDef>> {
        cs.into_iter().map(|c| self.resolve_concrete(c)).collect()
    }
}

impl Transformer for GenericInlineResolver {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        let resolved = match expr {
            Expr::Call {
                this,
                ty,
                method,
                args,
            } => Expr::Call {
                this,
                ty: self.resolve_concrete(ty),
                method: self.resolve_concrete(method),
                args,
            },
            Expr::Ctor { ty, ctor, args } => Expr::Ctor {
                ty: self.resolve_concrete(ty),
                ctor,
                args,
            },
            Expr::BaseCtor {
                this,
                ty,
                ctor,
                args,
            } => Expr::BaseCtor {
                this,
                ty: self.resolve_concrete(ty),
                ctor,
                args,
            },
            Expr::NewDelegate { this, ty, method } => Expr::NewDelegate {
                this,
                ty: self.resolve_concrete(ty),
                method: self.resolve_concrete(method),
            },
            Expr::NewRecord { ty, args } => Expr::NewRecord {
                ty: self.resolve_concrete(ty),
                args,
            },
            Expr::NewUnionCase { ty, case, args } => Expr::NewUnionCase {
                ty: self.resolve_concrete(ty),
                case,
                args,
            },
            Expr::UnionCaseTest { expr, ty, case } => Expr::UnionCaseTest {
                expr,
                ty: self.resolve_concrete(ty),
                case,
            },
            Expr::UnionCaseGet {
                expr,
                ty,
                case,
                field,
            } => Expr::UnionCaseGet {
                expr,
                ty: self.resolve_concrete(ty),
                case,
                field,
            },
            Expr::UnionCaseTag { expr, ty } => Expr::UnionCaseTag {
                expr,
                ty: self.resolve_concrete(ty),
            },
            Expr::FieldGet { this, ty, field } => Expr::FieldGet {
                this,
                ty: self.resolve_concrete(ty),
                field,
            },
            Expr::FieldSet {
                this,
                ty,
                field,
                value,
            } => Expr::FieldSet {
                this,
                ty: self.resolve_concrete(ty),
                field,
                value,
            },
            Expr::TypeCheck { expr, ty } => Expr::TypeCheck {
                expr,
                ty: self.resolve(ty),
            },
            Expr::TraitCall {
                this,
                types,
                method,
                args,
            } => Expr::TraitCall {
                this,
                types: self.resolve_concretes(types),
                method: self.resolve_concrete(method),
                args,
            },
            other => other,
        };
        self.transform_expr_parts(resolved)
    }
}
