//! Structural recursion over the IR.
//!
//! `Transformer` is a by-value rewriter: every pass and the translator
//! itself implement it, overriding only the arms they care about and
//! delegating the rest to the provided `*_parts` recursion. `Visitor` is
//! the borrowing counterpart for analyses.

use crate::expr::Expr;
use crate::id::Id;
use crate::stmt::{Statement, SwitchCase};

/// A by-value IR rewriter with default structural recursion.
///
/// Binding occurrences flow through `transform_binder`, variable uses
/// through `transform_id`; scoping order is preserved (a `let` value is
/// transformed before its binder, a function's parameters before its
/// body).
pub trait Transformer {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        self.transform_expr_parts(expr)
    }

    fn transform_statement(&mut self, stmt: Statement) -> Statement {
        self.transform_statement_parts(stmt)
    }

    /// Hook for variable uses.
    fn transform_id(&mut self, id: Id) -> Id {
        id
    }

    /// Hook for binding occurrences.
    fn transform_binder(&mut self, id: Id) -> Id {
        id
    }

    /// Default recursion for expressions. Not meant to be overridden.
    fn transform_expr_parts(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Undefined
            | Expr::This
            | Expr::Base
            | Expr::SelfAddress
            | Expr::Value(_)
            | Expr::GlobalAccess(_)
            | Expr::Verbatim(_)
            | Expr::Hole(_)
            | Expr::Cctor(_) => expr,
            Expr::Var(id) => Expr::Var(self.transform_id(id)),
            Expr::VarSet(id, value) => {
                let id = self.transform_id(id);
                Expr::VarSet(id, Box::new(self.transform_expr(*value)))
            }
            Expr::Application {
                target,
                args,
                purity,
            } => Expr::Application {
                target: Box::new(self.transform_expr(*target)),
                args: self.transform_exprs(args),
                purity,
            },
            Expr::Function { params, body } => {
                let params = params
                    .into_iter()
                    .map(|p| self.transform_binder(p))
                    .collect();
                Expr::Function {
                    params,
                    body: Box::new(self.transform_statement(*body)),
                }
            }
            Expr::Let { var, value, body } => {
                let value = self.transform_expr(*value);
                let var = self.transform_binder(var);
                Expr::Let {
                    var,
                    value: Box::new(value),
                    body: Box::new(self.transform_expr(*body)),
                }
            }
            Expr::LetRec { bindings, body } => {
                let bindings = bindings
                    .into_iter()
                    .map(|(id, e)| (self.transform_binder(id), e))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .map(|(id, e)| (id, self.transform_expr(e)))
                    .collect();
                Expr::LetRec {
                    bindings,
                    body: Box::new(self.transform_expr(*body)),
                }
            }
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => Expr::Conditional {
                condition: Box::new(self.transform_expr(*condition)),
                if_true: Box::new(self.transform_expr(*if_true)),
                if_false: Box::new(self.transform_expr(*if_false)),
            },
            Expr::Sequential(es) => Expr::Sequential(self.transform_exprs(es)),
            Expr::Object(fields) => Expr::Object(
                fields
                    .into_iter()
                    .map(|(n, e)| (n, self.transform_expr(e)))
                    .collect(),
            ),
            Expr::NewArray(es) => Expr::NewArray(self.transform_exprs(es)),
            Expr::ItemGet {
                target,
                item,
                purity,
            } => Expr::ItemGet {
                target: Box::new(self.transform_expr(*target)),
                item: Box::new(self.transform_expr(*item)),
                purity,
            },
            Expr::ItemSet {
                target,
                item,
                value,
            } => Expr::ItemSet {
                target: Box::new(self.transform_expr(*target)),
                item: Box::new(self.transform_expr(*item)),
                value: Box::new(self.transform_expr(*value)),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op,
                expr: Box::new(self.transform_expr(*expr)),
            },
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.transform_expr(*left)),
                op,
                right: Box::new(self.transform_expr(*right)),
            },
            Expr::New { target, args } => Expr::New {
                target: Box::new(self.transform_expr(*target)),
                args: self.transform_exprs(args),
            },
            Expr::Await(e) => Expr::Await(Box::new(self.transform_expr(*e))),
            Expr::NamedParameter { name, value } => Expr::NamedParameter {
                name,
                value: Box::new(self.transform_expr(*value)),
            },
            Expr::RefOrOutParameter(e) => {
                Expr::RefOrOutParameter(Box::new(self.transform_expr(*e)))
            }
            Expr::Coalesce { left, right } => Expr::Coalesce {
                left: Box::new(self.transform_expr(*left)),
                right: Box::new(self.transform_expr(*right)),
            },
            Expr::StatementExpr { statement, result } => Expr::StatementExpr {
                statement: Box::new(self.transform_statement(*statement)),
                result,
            },
            Expr::OptimizedClosure { expr, shape } => Expr::OptimizedClosure {
                expr: Box::new(self.transform_expr(*expr)),
                shape,
            },
            Expr::WithSpan { span, expr } => Expr::WithSpan {
                span,
                expr: Box::new(self.transform_expr(*expr)),
            },
            Expr::Call {
                this,
                ty,
                method,
                args,
            } => Expr::Call {
                this: this.map(|t| Box::new(self.transform_expr(*t))),
                ty,
                method,
                args: self.transform_exprs(args),
            },
            Expr::Ctor { ty, ctor, args } => Expr::Ctor {
                ty,
                ctor,
                args: self.transform_exprs(args),
            },
            Expr::BaseCtor {
                this,
                ty,
                ctor,
                args,
            } => Expr::BaseCtor {
                this: Box::new(self.transform_expr(*this)),
                ty,
                ctor,
                args: self.transform_exprs(args),
            },
            Expr::CopyCtor { ty, object } => Expr::CopyCtor {
                ty,
                object: Box::new(self.transform_expr(*object)),
            },
            Expr::NewDelegate { this, ty, method } => Expr::NewDelegate {
                this: this.map(|t| Box::new(self.transform_expr(*t))),
                ty,
                method,
            },
            Expr::NewRecord { ty, args } => Expr::NewRecord {
                ty,
                args: self.transform_exprs(args),
            },
            Expr::NewUnionCase { ty, case, args } => Expr::NewUnionCase {
                ty,
                case,
                args: self.transform_exprs(args),
            },
            Expr::UnionCaseTest { expr, ty, case } => Expr::UnionCaseTest {
                expr: Box::new(self.transform_expr(*expr)),
                ty,
                case,
            },
            Expr::UnionCaseGet {
                expr,
                ty,
                case,
                field,
            } => Expr::UnionCaseGet {
                expr: Box::new(self.transform_expr(*expr)),
                ty,
                case,
                field,
            },
            Expr::UnionCaseTag { expr, ty } => Expr::UnionCaseTag {
                expr: Box::new(self.transform_expr(*expr)),
                ty,
            },
            Expr::FieldGet { this, ty, field } => Expr::FieldGet {
                this: this.map(|t| Box::new(self.transform_expr(*t))),
                ty,
                field,
            },
            Expr::FieldSet {
                this,
                ty,
                field,
                value,
            } => Expr::FieldSet {
                this: this.map(|t| Box::new(self.transform_expr(*t))),
                ty,
                field,
                value: Box::new(self.transform_expr(*value)),
            },
            Expr::TypeCheck { expr, ty } => Expr::TypeCheck {
                expr: Box::new(self.transform_expr(*expr)),
                ty,
            },
            Expr::TraitCall {
                this,
                types,
                method,
                args,
            } => Expr::TraitCall {
                this: this.map(|t| Box::new(self.transform_expr(*t))),
                types,
                method,
                args: self.transform_exprs(args),
            },
        }
    }

    /// Default recursion for statements. Not meant to be overridden.
    fn transform_statement_parts(&mut self, stmt: Statement) -> Statement {
        match stmt {
            Statement::Empty | Statement::Break(_) | Statement::Continue(_) => stmt,
            Statement::Block(ss) => Statement::Block(
                ss.into_iter()
                    .map(|s| self.transform_statement(s))
                    .collect(),
            ),
            Statement::ExprStatement(e) => Statement::ExprStatement(self.transform_expr(e)),
            Statement::Return(e) => Statement::Return(self.transform_expr(e)),
            Statement::VarDeclaration(id, e) => {
                let e = self.transform_expr(e);
                Statement::VarDeclaration(self.transform_binder(id), e)
            }
            Statement::If {
                condition,
                if_true,
                if_false,
            } => Statement::If {
                condition: self.transform_expr(condition),
                if_true: Box::new(self.transform_statement(*if_true)),
                if_false: Box::new(self.transform_statement(*if_false)),
            },
            Statement::While { condition, body } => Statement::While {
                condition: self.transform_expr(condition),
                body: Box::new(self.transform_statement(*body)),
            },
            Statement::DoWhile { body, condition } => Statement::DoWhile {
                body: Box::new(self.transform_statement(*body)),
                condition: self.transform_expr(condition),
            },
            Statement::For {
                init,
                condition,
                step,
                body,
            } => Statement::For {
                init: init.map(|e| self.transform_expr(e)),
                condition: condition.map(|e| self.transform_expr(e)),
                step: step.map(|e| self.transform_expr(e)),
                body: Box::new(self.transform_statement(*body)),
            },
            Statement::Switch { expr, cases } => Statement::Switch {
                expr: self.transform_expr(expr),
                cases: cases
                    .into_iter()
                    .map(|c| SwitchCase {
                        label: c.label.map(|e| self.transform_expr(e)),
                        body: c
                            .body
                            .into_iter()
                            .map(|s| self.transform_statement(s))
                            .collect(),
                    })
                    .collect(),
            },
            Statement::Labeled { label, body } => Statement::Labeled {
                label,
                body: Box::new(self.transform_statement(*body)),
            },
            Statement::Throw(e) => Statement::Throw(self.transform_expr(e)),
            Statement::TryWith { body, var, handler } => {
                let body = Box::new(self.transform_statement(*body));
                let var = var.map(|v| self.transform_binder(v));
                Statement::TryWith {
                    body,
                    var,
                    handler: Box::new(self.transform_statement(*handler)),
                }
            }
            Statement::TryFinally { body, finalizer } => Statement::TryFinally {
                body: Box::new(self.transform_statement(*body)),
                finalizer: Box::new(self.transform_statement(*finalizer)),
            },
            Statement::WithSpan { span, statement } => Statement::WithSpan {
                span,
                statement: Box::new(self.transform_statement(*statement)),
            },
        }
    }

    fn transform_exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.transform_expr(e)).collect()
    }
}

/// A borrowing IR walker with default structural recursion.
pub trait Visitor {
    fn visit_expr(&mut self, expr: &Expr) {
        self.visit_expr_parts(expr);
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        self.visit_statement_parts(stmt);
    }

    /// Default recursion for expressions. Not meant to be overridden.
    fn visit_expr_parts(&mut self, expr: &Expr) {
        match expr {
            Expr::Undefined
            | Expr::This
            | Expr::Base
            | Expr::SelfAddress
            | Expr::Var(_)
            | Expr::Value(_)
            | Expr::GlobalAccess(_)
            | Expr::Verbatim(_)
            | Expr::Hole(_)
            | Expr::Cctor(_) => {}
            Expr::VarSet(_, value) => self.visit_expr(value),
            Expr::Application { target, args, .. } => {
                self.visit_expr(target);
                for a in args {
                    self.visit_expr(a);
                }
            }
            Expr::Function { body, .. } => self.visit_statement(body),
            Expr::Let { value, body, .. } => {
                self.visit_expr(value);
                self.visit_expr(body);
            }
            Expr::LetRec { bindings, body } => {
                for (_, e) in bindings {
                    self.visit_expr(e);
                }
                self.visit_expr(body);
            }
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                self.visit_expr(condition);
                self.visit_expr(if_true);
                self.visit_expr(if_false);
            }
            Expr::Sequential(es) | Expr::NewArray(es) => {
                for e in es {
                    self.visit_expr(e);
                }
            }
            Expr::Object(fields) => {
                for (_, e) in fields {
                    self.visit_expr(e);
                }
            }
            Expr::ItemGet { target, item, .. } => {
                self.visit_expr(target);
                self.visit_expr(item);
            }
            Expr::ItemSet {
                target,
                item,
                value,
            } => {
                self.visit_expr(target);
                self.visit_expr(item);
                self.visit_expr(value);
            }
            Expr::Unary { expr, .. }
            | Expr::Await(expr)
            | Expr::RefOrOutParameter(expr)
            | Expr::OptimizedClosure { expr, .. }
            | Expr::WithSpan { expr, .. }
            | Expr::CopyCtor { object: expr, .. }
            | Expr::NamedParameter { value: expr, .. } => self.visit_expr(expr),
            Expr::Binary { left, right, .. } | Expr::Coalesce { left, right } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::New { target, args } => {
                self.visit_expr(target);
                for a in args {
                    self.visit_expr(a);
                }
            }
            Expr::StatementExpr { statement, .. } => self.visit_statement(statement),
            Expr::Call { this, args, .. } | Expr::TraitCall { this, args, .. } => {
                if let Some(t) = this {
                    self.visit_expr(t);
                }
                for a in args {
                    self.visit_expr(a);
                }
            }
            Expr::Ctor { args, .. }
            | Expr::NewRecord { args, .. }
            | Expr::NewUnionCase { args, .. } => {
                for a in args {
                    self.visit_expr(a);
                }
            }
            Expr::BaseCtor { this, args, .. } => {
                self.visit_expr(this);
                for a in args {
                    self.visit_expr(a);
                }
            }
            Expr::NewDelegate { this, .. } => {
                if let Some(t) = this {
                    self.visit_expr(t);
                }
            }
            Expr::UnionCaseTest { expr, .. }
            | Expr::UnionCaseGet { expr, .. }
            | Expr::UnionCaseTag { expr, .. }
            | Expr::TypeCheck { expr, .. } => self.visit_expr(expr),
            Expr::FieldGet { this, .. } => {
                if let Some(t) = this {
                    self.visit_expr(t);
                }
            }
            Expr::FieldSet { this, value, .. } => {
                if let Some(t) = this {
                    self.visit_expr(t);
                }
                self.visit_expr(value);
            }
        }
    }

    /// Default recursion for statements. Not meant to be overridden.
    fn visit_statement_parts(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Empty | Statement::Break(_) | Statement::Continue(_) => {}
            Statement::Block(ss) => {
                for s in ss {
                    self.visit_statement(s);
                }
            }
            Statement::ExprStatement(e) | Statement::Return(e) | Statement::Throw(e) => {
                self.visit_expr(e)
            }
            Statement::VarDeclaration(_, e) => self.visit_expr(e),
            Statement::If {
                condition,
                if_true,
                if_false,
            } => {
                self.visit_expr(condition);
                self.visit_statement(if_true);
                self.visit_statement(if_false);
            }
            Statement::While { condition, body } => {
                self.visit_expr(condition);
                self.visit_statement(body);
            }
            Statement::DoWhile { body, condition } => {
                self.visit_statement(body);
                self.visit_expr(condition);
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                for e in [init, condition, step].into_iter().flatten() {
                    self.visit_expr(e);
                }
                self.visit_statement(body);
            }
            Statement::Switch { expr, cases } => {
                self.visit_expr(expr);
                for c in cases {
                    if let Some(l) = &c.label {
                        self.visit_expr(l);
                    }
                    for s in &c.body {
                        self.visit_statement(s);
                    }
                }
            }
            Statement::Labeled { body, .. } => self.visit_statement(body),
            Statement::TryWith { body, handler, .. } => {
                self.visit_statement(body);
                self.visit_statement(handler);
            }
            Statement::TryFinally { body, finalizer } => {
                self.visit_statement(body);
                self.visit_statement(finalizer);
            }
            Statement::WithSpan { statement, .. } => self.visit_statement(statement),
        }
    }
}

struct SpanRemover;

impl Transformer for SpanRemover {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::WithSpan { expr, .. } => self.transform_expr(*expr),
            other => self.transform_expr_parts(other),
        }
    }

    fn transform_statement(&mut self, stmt: Statement) -> Statement {
        match stmt {
            Statement::WithSpan { statement, .. } => self.transform_statement(*statement),
            other => self.transform_statement_parts(other),
        }
    }
}

/// Remove every span wrapper from an expression tree.
pub fn remove_spans(expr: Expr) -> Expr {
    SpanRemover.transform_expr(expr)
}

struct CountUses<'a> {
    id: &'a Id,
    count: usize,
}

impl Visitor for CountUses<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Var(v) if v == self.id => self.count += 1,
            Expr::VarSet(v, value) => {
                if v == self.id {
                    self.count += 1;
                }
                self.visit_expr(value);
            }
            other => self.visit_expr_parts(other),
        }
    }
}

/// Number of uses (reads and writes) of `id` in `expr`.
pub fn count_var_uses(expr: &Expr, id: &Id) -> usize {
    let mut c = CountUses { id, count: 0 };
    c.visit_expr(expr);
    c.count
}

struct FindAssignment<'a> {
    id: &'a Id,
    found: bool,
}

impl Visitor for FindAssignment<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.found {
            return;
        }
        if let Expr::VarSet(v, _) = expr {
            if v == self.id {
                self.found = true;
                return;
            }
        }
        self.visit_expr_parts(expr);
    }
}

/// Whether `id` is assigned anywhere in `expr`.
pub fn is_assigned_in(expr: &Expr, id: &Id) -> bool {
    let mut f = FindAssignment { id, found: false };
    f.visit_expr(expr);
    f.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOperator, Purity};
    use crate::span::Span;

    struct Identity;
    impl Transformer for Identity {}

    #[test]
    fn test_default_recursion_is_identity() {
        let id = Id::named("x");
        let e = Expr::let_in(
            id.clone(),
            Expr::int(1),
            Expr::binary(Expr::Var(id), BinaryOperator::Add, Expr::int(2)),
        );
        assert_eq!(Identity.transform_expr(e.clone()), e);
    }

    #[test]
    fn test_default_recursion_keeps_js_statements() {
        let s = Statement::If {
            condition: Expr::bool(true),
            if_true: Box::new(Statement::Return(Expr::int(1))),
            if_false: Box::new(Statement::Return(Expr::int(2))),
        };
        assert_eq!(Identity.transform_statement(s.clone()), s);
    }

    #[test]
    fn test_remove_spans() {
        let e = Expr::WithSpan {
            span: Span::new(0, 4, 1, 1),
            expr: Box::new(Expr::apply(
                Expr::global(["f"]),
                vec![Expr::WithSpan {
                    span: Span::new(2, 3, 1, 3),
                    expr: Box::new(Expr::int(1)),
                }],
            )),
        };
        assert_eq!(
            remove_spans(e),
            Expr::apply(Expr::global(["f"]), vec![Expr::int(1)])
        );
    }

    #[test]
    fn test_count_var_uses() {
        let x = Id::named("x");
        let e = Expr::Sequential(vec![
            Expr::Var(x.clone()),
            Expr::VarSet(x.clone(), Box::new(Expr::Var(x.clone()))),
            Expr::ItemGet {
                target: Box::new(Expr::Var(x.clone())),
                item: Box::new(Expr::int(0)),
                purity: Purity::NoSideEffect,
            },
        ]);
        assert_eq!(count_var_uses(&e, &x), 4);
        assert!(is_assigned_in(&e, &x));
        let y = Id::named("y");
        assert_eq!(count_var_uses(&e, &y), 0);
        assert!(!is_assigned_in(&e, &y));
    }
}
