//! Curried-function recognition.
//!
//! An eta-expanded lambda chain whose innermost body is a saturated
//! application of a free function is rewritten to a runtime currying
//! wrapper, so the emitted value is shared instead of re-allocated. The
//! outermost function of a constructor body is skipped, since the
//! runtime relies on the identity of the constructor function.

use quill_ast::{count_var_uses, Expr, Id, Purity, Statement, Transformer};

use crate::runtime::{self, helpers};

/// The curried-function collector.
pub struct CurriedCollector {
    skip_top: bool,
}

impl CurriedCollector {
    pub fn new(skip_top: bool) -> Self {
        Self { skip_top }
    }

    /// Run over a member body.
    pub fn run(mut self, expr: Expr) -> Expr {
        if self.skip_top {
            match expr {
                Expr::Function { params, body } => Expr::Function {
                    params,
                    body: Box::new(self.transform_statement(*body)),
                },
                other => self.transform_expr(other),
            }
        } else {
            self.transform_expr(expr)
        }
    }
}

impl Transformer for CurriedCollector {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        let expr = self.transform_expr_parts(expr);
        match match_curried(&expr) {
            Some(rewritten) => rewritten,
            None => expr,
        }
    }
}

/// `fn (a) { return fn (b) { .. return f(x.., a, b, ..) .. } }` with the
/// trailing arguments exactly the bound chain and `f`/leading arguments
/// free of them.
fn match_curried(e: &Expr) -> Option<Expr> {
    let mut params: Vec<Id> = Vec::new();
    let mut cur = e.strip_span();
    loop {
        match cur {
            Expr::Function { params: ps, body } if ps.len() == 1 => {
                match single_return(body) {
                    Some(inner) => {
                        params.push(ps[0].clone());
                        cur = inner.strip_span();
                    }
                    None => break,
                }
            }
            _ => break,
        }
    }
    if params.len() < 2 {
        return None;
    }
    let Expr::Application { target, args, .. } = cur else {
        return None;
    };
    if args.len() < params.len() {
        return None;
    }
    let lead_count = args.len() - params.len();
    let (lead, trail) = args.split_at(lead_count);
    for (a, p) in trail.iter().zip(&params) {
        if !matches!(a.strip_span(), Expr::Var(v) if v == p) {
            return None;
        }
    }
    for p in &params {
        if count_var_uses(target, p) > 0 {
            return None;
        }
        if lead.iter().any(|l| count_var_uses(l, p) > 0) {
            return None;
        }
    }
    let f = (**target).clone();
    let n = params.len();
    Some(if lead_count == 0 {
        match n {
            2 => wrapper(helpers::CURRIED2, vec![f]),
            3 => wrapper(helpers::CURRIED3, vec![f]),
            _ => wrapper(helpers::CURRIED, vec![f, Expr::int(n as i64)]),
        }
    } else {
        wrapper(
            helpers::CURRIED_A,
            vec![f, Expr::int(n as i64), Expr::NewArray(lead.to_vec())],
        )
    })
}

fn wrapper(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Application {
        target: Box::new(runtime::global(name)),
        args,
        purity: Purity::Pure,
    }
}

/// The sole expression a body returns, if that is all the body does.
fn single_return(body: &Statement) -> Option<&Expr> {
    match body.strip_span() {
        Statement::Return(e) => Some(e),
        Statement::Block(ss) if ss.len() == 1 => single_return(&ss[0]),
        _ => None,
    }
}
