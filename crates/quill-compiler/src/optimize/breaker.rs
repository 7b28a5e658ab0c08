//! The statement breaker.
//!
//! Non-inline compiled output must not contain `Let`, `LetRec`,
//! `StatementExpr` or statement-position `Sequential` nodes. This pass
//! hoists them out of expression positions into prefix statements,
//! introducing temporaries where earlier impure siblings would otherwise
//! be reordered. The inline optimizer is the expression-form variant used
//! for inline bodies, which keep their bindings.

use quill_ast::{
    BinaryOperator, Expr, Id, Purity, Statement, SwitchCase, Transformer, UnaryOperator,
};

/// Breaks statement-bearing expressions into statements.
pub struct StatementBreaker;

impl StatementBreaker {
    /// Break a compiled member body (a function expression).
    pub fn break_body(expr: Expr) -> Expr {
        let mut b = StatementBreaker;
        match expr {
            Expr::Function { params, body } => Expr::Function {
                params,
                body: Box::new(Statement::block(b.break_statement(*body))),
            },
            other => {
                let (stmts, e) = b.break_expr(other);
                if stmts.is_empty() {
                    e
                } else {
                    // a bare expression body that needs statements gets an
                    // immediately applied function
                    let mut body = stmts;
                    body.push(Statement::Return(e));
                    Expr::apply(
                        Expr::lambda(vec![], Statement::block(body)),
                        vec![],
                    )
                }
            }
        }
    }

    /// Break a top-level statement (the entry point).
    pub fn break_top_statement(stmt: Statement) -> Statement {
        Statement::block(StatementBreaker.break_statement(stmt))
    }

    fn break_statement(&mut self, stmt: Statement) -> Vec<Statement> {
        match stmt {
            Statement::Empty => Vec::new(),
            Statement::Block(ss) => {
                let inner: Vec<Statement> = ss
                    .into_iter()
                    .flat_map(|s| self.break_statement(s))
                    .collect();
                vec![Statement::block(inner)]
            }
            Statement::ExprStatement(e) => match e {
                Expr::Sequential(es) => es
                    .into_iter()
                    .flat_map(|e| self.break_statement(Statement::ExprStatement(e)))
                    .collect(),
                Expr::Undefined => Vec::new(),
                e => {
                    let (mut out, e) = self.break_expr(e);
                    if !matches!(e, Expr::Undefined) {
                        out.push(Statement::ExprStatement(e));
                    }
                    out
                }
            },
            Statement::Return(e) => {
                let (mut out, e) = self.break_expr(e);
                out.push(Statement::Return(e));
                out
            }
            Statement::Throw(e) => {
                let (mut out, e) = self.break_expr(e);
                out.push(Statement::Throw(e));
                out
            }
            Statement::VarDeclaration(id, e) => {
                let (mut out, e) = self.break_expr(e);
                out.push(Statement::VarDeclaration(id, e));
                out
            }
            Statement::If {
                condition,
                if_true,
                if_false,
            } => {
                let (mut out, condition) = self.break_expr(condition);
                out.push(Statement::If {
                    condition,
                    if_true: Box::new(Statement::block(self.break_statement(*if_true))),
                    if_false: Box::new(Statement::block(self.break_statement(*if_false))),
                });
                out
            }
            Statement::While { condition, body } => {
                let (prefix, condition) = self.break_expr(condition);
                let body = Statement::block(self.break_statement(*body));
                if prefix.is_empty() {
                    vec![Statement::While {
                        condition,
                        body: Box::new(body),
                    }]
                } else {
                    // the condition needs statements; run them on every
                    // iteration inside an unconditional loop
                    let mut loop_body = prefix;
                    loop_body.push(Statement::If {
                        condition: Expr::unary(UnaryOperator::Not, condition),
                        if_true: Box::new(Statement::Break(None)),
                        if_false: Box::new(Statement::Empty),
                    });
                    loop_body.push(body);
                    vec![Statement::While {
                        condition: Expr::bool(true),
                        body: Box::new(Statement::block(loop_body)),
                    }]
                }
            }
            Statement::DoWhile { body, condition } => {
                let mut body = self.break_statement(*body);
                let (prefix, condition) = self.break_expr(condition);
                body.extend(prefix);
                vec![Statement::DoWhile {
                    body: Box::new(Statement::block(body)),
                    condition,
                }]
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => self.break_for(init, condition, step, *body),
            Statement::Switch { expr, cases } => {
                let (mut out, expr) = self.break_expr(expr);
                let cases = cases
                    .into_iter()
                    .map(|c| SwitchCase {
                        label: c.label,
                        body: c
                            .body
                            .into_iter()
                            .flat_map(|s| self.break_statement(s))
                            .collect(),
                    })
                    .collect();
                out.push(Statement::Switch { expr, cases });
                out
            }
            Statement::Break(l) => vec![Statement::Break(l)],
            Statement::Continue(l) => vec![Statement::Continue(l)],
            Statement::Labeled { label, body } => vec![Statement::Labeled {
                label,
                body: Box::new(Statement::block(self.break_statement(*body))),
            }],
            Statement::TryWith { body, var, handler } => vec![Statement::TryWith {
                body: Box::new(Statement::block(self.break_statement(*body))),
                var,
                handler: Box::new(Statement::block(self.break_statement(*handler))),
            }],
            Statement::TryFinally { body, finalizer } => vec![Statement::TryFinally {
                body: Box::new(Statement::block(self.break_statement(*body))),
                finalizer: Box::new(Statement::block(self.break_statement(*finalizer))),
            }],
            Statement::WithSpan { span, statement } => vec![Statement::WithSpan {
                span,
                statement: Box::new(Statement::block(self.break_statement(*statement))),
            }],
        }
    }

    fn break_for(
        &mut self,
        init: Option<Expr>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Statement,
    ) -> Vec<Statement> {
        let (mut out, init) = match init {
            Some(e) => {
                let (p, e) = self.break_expr(e);
                (p, Some(e))
            }
            None => (Vec::new(), None),
        };
        let (pc, condition) = match condition {
            Some(e) => {
                let (p, e) = self.break_expr(e);
                (p, Some(e))
            }
            None => (Vec::new(), None),
        };
        let (ps, step) = match step {
            Some(e) => {
                let (p, e) = self.break_expr(e);
                (p, Some(e))
            }
            None => (Vec::new(), None),
        };
        let body = Statement::block(self.break_statement(body));
        if pc.is_empty() && ps.is_empty() {
            out.push(Statement::For {
                init,
                condition,
                step,
                body: Box::new(body),
            });
            return out;
        }
        // lower to an unconditional while carrying the broken pieces
        if let Some(init) = init {
            out.push(Statement::ExprStatement(init));
        }
        let mut loop_body = pc;
        if let Some(condition) = condition {
            loop_body.push(Statement::If {
                condition: Expr::unary(UnaryOperator::Not, condition),
                if_true: Box::new(Statement::Break(None)),
                if_false: Box::new(Statement::Empty),
            });
        }
        loop_body.push(body);
        loop_body.extend(ps);
        if let Some(step) = step {
            loop_body.push(Statement::ExprStatement(step));
        }
        out.push(Statement::While {
            condition: Expr::bool(true),
            body: Box::new(Statement::block(loop_body)),
        });
        out
    }

    /// Break an expression into prefix statements and a residual
    /// statement-free expression.
    fn break_expr(&mut self, expr: Expr) -> (Vec<Statement>, Expr) {
        match expr {
            Expr::Let { var, value, body } => {
                let (mut out, value) = self.break_expr(*value);
                out.push(Statement::VarDeclaration(var, value));
                let (p, body) = self.break_expr(*body);
                out.extend(p);
                (out, body)
            }
            Expr::LetRec { bindings, body } => {
                let mut out = Vec::new();
                for (id, value) in bindings {
                    let (p, value) = self.break_expr(value);
                    out.extend(p);
                    out.push(Statement::VarDeclaration(id, value));
                }
                let (p, body) = self.break_expr(*body);
                out.extend(p);
                (out, body)
            }
            Expr::Sequential(mut es) => {
                let last = es.pop().unwrap_or(Expr::Undefined);
                let mut out = Vec::new();
                for e in es {
                    out.extend(self.break_statement(Statement::ExprStatement(e)));
                }
                let (p, last) = self.break_expr(last);
                out.extend(p);
                (out, last)
            }
            Expr::StatementExpr { statement, result } => match result {
                Some(id) => {
                    let mut out = vec![Statement::VarDeclaration(id.clone(), Expr::Undefined)];
                    out.extend(self.break_statement(*statement));
                    (out, Expr::Var(id))
                }
                None => (self.break_statement(*statement), Expr::Undefined),
            },
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                let (mut out, condition) = self.break_expr(*condition);
                let (pt, t) = self.break_expr(*if_true);
                let (pf, f) = self.break_expr(*if_false);
                if pt.is_empty() && pf.is_empty() {
                    return (out, Expr::conditional(condition, t, f));
                }
                let tmp = Id::named_mut("r");
                out.push(Statement::VarDeclaration(tmp.clone(), Expr::Undefined));
                let mut tb = pt;
                tb.push(Statement::ExprStatement(Expr::VarSet(
                    tmp.clone(),
                    Box::new(t),
                )));
                let mut fb = pf;
                fb.push(Statement::ExprStatement(Expr::VarSet(
                    tmp.clone(),
                    Box::new(f),
                )));
                out.push(Statement::If {
                    condition,
                    if_true: Box::new(Statement::block(tb)),
                    if_false: Box::new(Statement::block(fb)),
                });
                (out, Expr::Var(tmp))
            }
            Expr::Binary { left, op, right }
                if matches!(op, BinaryOperator::And | BinaryOperator::Or) =>
            {
                self.break_short_circuit(*left, op, *right)
            }
            Expr::Binary { left, op, right } => {
                let (out, mut es) = self.break_list(vec![*left, *right]);
                let right = es.pop().expect("two items");
                let left = es.pop().expect("two items");
                (
                    out,
                    Expr::Binary {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                )
            }
            Expr::Application {
                target,
                mut args,
                purity,
            } => {
                let mut items = vec![*target];
                items.append(&mut args);
                let (out, mut es) = self.break_list(items);
                let target = es.remove(0);
                (
                    out,
                    Expr::Application {
                        target: Box::new(target),
                        args: es,
                        purity,
                    },
                )
            }
            Expr::New { target, mut args } => {
                let mut items = vec![*target];
                items.append(&mut args);
                let (out, mut es) = self.break_list(items);
                let target = es.remove(0);
                (
                    out,
                    Expr::New {
                        target: Box::new(target),
                        args: es,
                    },
                )
            }
            Expr::NewArray(es) => {
                let (out, es) = self.break_list(es);
                (out, Expr::NewArray(es))
            }
            Expr::Object(fields) => {
                let (names, values): (Vec<String>, Vec<Expr>) = fields.into_iter().unzip();
                let (out, values) = self.break_list(values);
                (out, Expr::Object(names.into_iter().zip(values).collect()))
            }
            Expr::ItemGet {
                target,
                item,
                purity,
            } => {
                let (out, mut es) = self.break_list(vec![*target, *item]);
                let item = es.pop().expect("two items");
                let target = es.pop().expect("two items");
                (
                    out,
                    Expr::ItemGet {
                        target: Box::new(target),
                        item: Box::new(item),
                        purity,
                    },
                )
            }
            Expr::ItemSet {
                target,
                item,
                value,
            } => {
                let (out, mut es) = self.break_list(vec![*target, *item, *value]);
                let value = es.pop().expect("three items");
                let item = es.pop().expect("three items");
                let target = es.pop().expect("three items");
                (
                    out,
                    Expr::ItemSet {
                        target: Box::new(target),
                        item: Box::new(item),
                        value: Box::new(value),
                    },
                )
            }
            Expr::Unary { op, expr } => {
                let (out, e) = self.break_expr(*expr);
                (
                    out,
                    Expr::Unary {
                        op,
                        expr: Box::new(e),
                    },
                )
            }
            Expr::VarSet(id, value) => {
                let (out, value) = self.break_expr(*value);
                (out, Expr::VarSet(id, Box::new(value)))
            }
            Expr::CopyCtor { ty, object } => {
                let (out, object) = self.break_expr(*object);
                (
                    out,
                    Expr::CopyCtor {
                        ty,
                        object: Box::new(object),
                    },
                )
            }
            Expr::OptimizedClosure { expr, shape } => {
                let (out, e) = self.break_expr(*expr);
                (
                    out,
                    Expr::OptimizedClosure {
                        expr: Box::new(e),
                        shape,
                    },
                )
            }
            Expr::Function { params, body } => (
                Vec::new(),
                Expr::Function {
                    params,
                    body: Box::new(Statement::block(self.break_statement(*body))),
                },
            ),
            Expr::WithSpan { span, expr } => {
                let (out, e) = self.break_expr(*expr);
                (
                    out,
                    Expr::WithSpan {
                        span,
                        expr: Box::new(e),
                    },
                )
            }
            other => (Vec::new(), other),
        }
    }

    /// `&&`/`||` with a statement-bearing right side cannot hoist it
    /// unconditionally; lower through a temporary and an `if`.
    fn break_short_circuit(
        &mut self,
        left: Expr,
        op: BinaryOperator,
        right: Expr,
    ) -> (Vec<Statement>, Expr) {
        let (mut out, left) = self.break_expr(left);
        let (pr, right) = self.break_expr(right);
        if pr.is_empty() {
            return (
                out,
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            );
        }
        let tmp = Id::named_mut("r");
        out.push(Statement::VarDeclaration(tmp.clone(), Expr::Undefined));
        let mut rhs = pr;
        rhs.push(Statement::ExprStatement(Expr::VarSet(
            tmp.clone(),
            Box::new(right),
        )));
        match op {
            BinaryOperator::And => {
                out.push(Statement::If {
                    condition: left,
                    if_true: Box::new(Statement::block(rhs)),
                    if_false: Box::new(Statement::ExprStatement(Expr::VarSet(
                        tmp.clone(),
                        Box::new(Expr::bool(false)),
                    ))),
                });
            }
            _ => {
                let l = Id::named("l");
                out.push(Statement::VarDeclaration(l.clone(), left));
                out.push(Statement::If {
                    condition: Expr::Var(l.clone()),
                    if_true: Box::new(Statement::ExprStatement(Expr::VarSet(
                        tmp.clone(),
                        Box::new(Expr::Var(l)),
                    ))),
                    if_false: Box::new(Statement::block(rhs)),
                });
            }
        }
        (out, Expr::Var(tmp))
    }

    /// Break a list of sibling expressions, hoisting earlier impure
    /// siblings into temporaries when a later one produces statements,
    /// so evaluation order is preserved.
    fn break_list(&mut self, exprs: Vec<Expr>) -> (Vec<Statement>, Vec<Expr>) {
        let broken: Vec<(Vec<Statement>, Expr)> =
            exprs.into_iter().map(|e| self.break_expr(e)).collect();
        let last_with_prefix = broken.iter().rposition(|(p, _)| !p.is_empty());
        let Some(k) = last_with_prefix else {
            return (Vec::new(), broken.into_iter().map(|(_, e)| e).collect());
        };
        let mut out = Vec::new();
        let mut es = Vec::new();
        for (i, (p, e)) in broken.into_iter().enumerate() {
            out.extend(p);
            if i < k && e.purity() < Purity::Pure {
                let t = Id::named("t");
                out.push(Statement::VarDeclaration(t.clone(), e));
                es.push(Expr::Var(t));
            } else {
                es.push(e);
            }
        }
        (out, es)
    }
}

/// The inline-body variant: keeps bindings, flattens sequential chains
/// and drops effect-free non-final elements.
pub struct InlineOptimizer;

impl Transformer for InlineOptimizer {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        let expr = self.transform_expr_parts(expr);
        match expr {
            Expr::Sequential(es) => {
                let n = es.len();
                let mut out = Vec::new();
                for (i, item) in es.into_iter().enumerate() {
                    let last = i + 1 == n;
                    match item {
                        Expr::Sequential(inner) => out.extend(inner),
                        item => {
                            if !last && item.purity() >= Purity::NoSideEffect {
                                continue;
                            }
                            out.push(item);
                        }
                    }
                }
                match out.len() {
                    0 => Expr::Undefined,
                    1 => out.pop().expect("one item"),
                    _ => Expr::Sequential(out),
                }
            }
            other => other,
        }
    }
}
