//! Invalid-form check.
//!
//! After the optimization chain, a compiled body must not contain any
//! node the writer cannot emit. Any occurrence is a translation bug; the
//! driver reports each offending kind once.

use quill_ast::{Expr, Visitor};

struct Check {
    inline: bool,
    found: Vec<&'static str>,
}

impl Check {
    fn record(&mut self, name: &'static str) {
        if !self.found.contains(&name) {
            self.found.push(name);
        }
    }
}

impl Visitor for Check {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::SelfAddress => self.record("Self"),
            Expr::Base => self.record("Base"),
            Expr::Await(_) => self.record("Await"),
            Expr::NamedParameter { .. } => self.record("NamedParameter"),
            Expr::RefOrOutParameter(_) => self.record("RefOrOutParameter"),
            Expr::Coalesce { .. } => self.record("Coalesce"),
            Expr::TypeCheck { .. } => self.record("TypeCheck"),
            Expr::FieldGet { .. } => self.record("FieldGet"),
            Expr::FieldSet { .. } => self.record("FieldSet"),
            Expr::NewDelegate { .. } => self.record("NewDelegate"),
            Expr::NewRecord { .. } => self.record("NewRecord"),
            Expr::NewUnionCase { .. } => self.record("NewUnionCase"),
            Expr::UnionCaseTest { .. } => self.record("UnionCaseTest"),
            Expr::UnionCaseGet { .. } => self.record("UnionCaseGet"),
            Expr::UnionCaseTag { .. } => self.record("UnionCaseTag"),
            Expr::Cctor(_) => self.record("Cctor"),
            Expr::Hole(_) if !self.inline => self.record("Hole"),
            Expr::Let { .. } if !self.inline => self.record("Let"),
            Expr::LetRec { .. } if !self.inline => self.record("LetRec"),
            Expr::StatementExpr { .. } if !self.inline => self.record("StatementExpr"),
            Expr::Call { .. } if !self.inline => self.record("Call"),
            Expr::Ctor { .. } | Expr::BaseCtor { .. } if !self.inline => self.record("Ctor"),
            Expr::TraitCall { .. } if !self.inline => self.record("TraitCall"),
            _ => {}
        }
        self.visit_expr_parts(expr);
    }
}

/// The kinds of forbidden nodes occurring in a compiled body.
pub fn invalid_forms(expr: &Expr, inline: bool) -> Vec<&'static str> {
    let mut check = Check {
        inline,
        found: Vec::new(),
    };
    check.visit_expr(expr);
    check.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_ast::{Id, Statement};

    #[test]
    fn test_clean_output_passes() {
        let e = Expr::lambda(
            vec![Id::named("x")],
            Statement::Return(Expr::apply(Expr::global(["f"]), vec![Expr::int(1)])),
        );
        assert!(invalid_forms(&e, false).is_empty());
    }

    #[test]
    fn test_let_flagged_outside_inline_only() {
        let x = Id::named("x");
        let e = Expr::let_in(x.clone(), Expr::int(1), Expr::Var(x));
        assert_eq!(invalid_forms(&e, false), vec!["Let"]);
        assert!(invalid_forms(&e, true).is_empty());
    }

    #[test]
    fn test_forbidden_kinds_reported_once() {
        let e = Expr::Sequential(vec![Expr::Base, Expr::Base, Expr::SelfAddress]);
        assert_eq!(invalid_forms(&e, false), vec!["Base", "Self"]);
    }
}
