//! Let-removal.
//!
//! Drops bindings whose value can be dropped or substituted without
//! changing evaluation order: unused bindings of effect-free values,
//! trivial values, and single-use pure values. Mutable and assigned
//! bindings are never touched.

use quill_ast::{
    count_var_uses, is_assigned_in, Expr, Id, Purity, Transformer,
};

/// The let-removal pass.
pub struct LetRemoval;

impl Transformer for LetRemoval {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Let { var, value, body } => {
                let value = self.transform_expr(*value);
                let body = self.transform_expr(*body);
                reduce_let(var, value, body)
            }
            other => self.transform_expr_parts(other),
        }
    }
}

fn reduce_let(var: Id, value: Expr, body: Expr) -> Expr {
    if var.is_mutable() || is_assigned_in(&body, &var) {
        return Expr::let_in(var, value, body);
    }
    if matches!(body.strip_span(), Expr::Var(v) if *v == var) {
        return value;
    }
    let uses = count_var_uses(&body, &var);
    if uses == 0 {
        if value.purity() >= Purity::NoSideEffect {
            return body;
        }
        return Expr::Sequential(vec![value, body]);
    }
    let trivial = matches!(
        value.strip_span(),
        Expr::Value(_) | Expr::Var(_) | Expr::GlobalAccess(_) | Expr::Undefined | Expr::This
    );
    let substitutable =
        value.purity() == Purity::Pure && (trivial || uses == 1);
    if substitutable {
        let mut sub = SubstituteVar { var, value };
        return sub.transform_expr(body);
    }
    Expr::let_in(var, value, body)
}

struct SubstituteVar {
    var: Id,
    value: Expr,
}

impl Transformer for SubstituteVar {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Var(id) if id == self.var => self.value.clone(),
            other => self.transform_expr_parts(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_ast::BinaryOperator;

    #[test]
    fn test_unused_pure_binding_is_dropped() {
        let x = Id::named("x");
        let e = Expr::let_in(x, Expr::int(1), Expr::int(2));
        assert_eq!(LetRemoval.transform_expr(e), Expr::int(2));
    }

    #[test]
    fn test_unused_impure_binding_keeps_effect() {
        let x = Id::named("x");
        let call = Expr::apply(Expr::global(["f"]), vec![]);
        let e = Expr::let_in(x, call.clone(), Expr::int(2));
        assert_eq!(
            LetRemoval.transform_expr(e),
            Expr::Sequential(vec![call, Expr::int(2)])
        );
    }

    #[test]
    fn test_trivial_value_is_substituted() {
        let x = Id::named("x");
        let e = Expr::let_in(
            x.clone(),
            Expr::int(1),
            Expr::binary(
                Expr::Var(x.clone()),
                BinaryOperator::Add,
                Expr::Var(x),
            ),
        );
        assert_eq!(
            LetRemoval.transform_expr(e),
            Expr::binary(Expr::int(1), BinaryOperator::Add, Expr::int(1))
        );
    }

    #[test]
    fn test_identity_body_reduces_to_value() {
        let x = Id::named("x");
        let call = Expr::apply(Expr::global(["f"]), vec![]);
        let e = Expr::let_in(x.clone(), call.clone(), Expr::Var(x));
        assert_eq!(LetRemoval.transform_expr(e), call);
    }

    #[test]
    fn test_mutable_binding_is_kept() {
        let x = Id::named_mut("x");
        let e = Expr::let_in(x.clone(), Expr::int(1), Expr::Var(x.clone()));
        // an assigned/mutable binding stays a binding
        assert!(matches!(
            LetRemoval.transform_expr(e),
            Expr::Let { .. }
        ));
    }

    #[test]
    fn test_assigned_binding_is_kept() {
        let x = Id::named("x");
        let body = Expr::Sequential(vec![
            Expr::VarSet(x.clone(), Box::new(Expr::int(3))),
            Expr::Var(x.clone()),
        ]);
        let e = Expr::let_in(x, Expr::int(1), body);
        assert!(matches!(LetRemoval.transform_expr(e), Expr::Let { .. }));
    }

    #[test]
    fn test_single_use_impure_value_is_kept() {
        let x = Id::named("x");
        let call = Expr::apply(Expr::global(["f"]), vec![]);
        let e = Expr::let_in(
            x.clone(),
            call,
            Expr::NewArray(vec![Expr::int(0), Expr::Var(x)]),
        );
        assert!(matches!(LetRemoval.transform_expr(e), Expr::Let { .. }));
    }
}
