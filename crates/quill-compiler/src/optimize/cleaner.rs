//! Runtime-call cleanup.
//!
//! Collapses saturated applications of the currying/tupling runtime
//! wrappers into direct calls. The forced variant additionally rewrites
//! any leftover shaped-argument node back into a runtime wrapper call,
//! so no shaped node survives into the final output.

use quill_ast::{Expr, FuncArgOptimization, Literal, Purity, Transformer};

use crate::runtime::{self, helpers};

/// The runtime cleaner; `force` selects the second, stricter run.
pub struct RuntimeCleaner {
    pub force: bool,
}

impl Transformer for RuntimeCleaner {
    fn transform_expr(&mut self, expr: Expr) -> Expr {
        let expr = self.transform_expr_parts(expr);
        self.clean(expr)
    }
}

impl RuntimeCleaner {
    fn clean(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Application {
                target,
                args,
                purity,
            } => {
                if let Some(collapsed) = try_collapse(&target, &args) {
                    collapsed
                } else {
                    Expr::Application {
                        target,
                        args,
                        purity,
                    }
                }
            }
            Expr::OptimizedClosure { expr, shape } if self.force => rewrap(*expr, shape),
            other => other,
        }
    }
}

/// Turn a shaped argument back into its unshaped form.
fn rewrap(expr: Expr, shape: FuncArgOptimization) -> Expr {
    match shape {
        FuncArgOptimization::NotOptimized => expr,
        FuncArgOptimization::Curried(n) if n <= 1 => expr,
        FuncArgOptimization::Curried(2) => Expr::Application {
            target: Box::new(runtime::global(helpers::CURRIED2)),
            args: vec![expr],
            purity: Purity::Pure,
        },
        FuncArgOptimization::Curried(3) => Expr::Application {
            target: Box::new(runtime::global(helpers::CURRIED3)),
            args: vec![expr],
            purity: Purity::Pure,
        },
        FuncArgOptimization::Curried(n) => Expr::Application {
            target: Box::new(runtime::global(helpers::CURRIED)),
            args: vec![expr, Expr::int(n as i64)],
            purity: Purity::Pure,
        },
        FuncArgOptimization::Tupled(_) => Expr::Application {
            target: Box::new(runtime::global(helpers::TUPLED)),
            args: vec![expr],
            purity: Purity::Pure,
        },
    }
}

enum WrapKind {
    Curried(usize),
    Tupled,
}

/// Identify a runtime wrapper call and extract the wrapped function.
fn wrapper_info(e: &Expr) -> Option<(Expr, WrapKind)> {
    let Expr::Application { target, args, .. } = e else {
        return None;
    };
    let t = target.strip_span();
    if runtime::is_helper(t, helpers::CURRIED2) && args.len() == 1 {
        return Some((args[0].clone(), WrapKind::Curried(2)));
    }
    if runtime::is_helper(t, helpers::CURRIED3) && args.len() == 1 {
        return Some((args[0].clone(), WrapKind::Curried(3)));
    }
    if runtime::is_helper(t, helpers::CURRIED) && args.len() == 2 {
        if let Expr::Value(Literal::Int(n)) = args[1].strip_span() {
            if *n >= 0 {
                return Some((args[0].clone(), WrapKind::Curried(*n as usize)));
            }
        }
    }
    if runtime::is_helper(t, helpers::TUPLED) && args.len() == 1 {
        return Some((args[0].clone(), WrapKind::Tupled));
    }
    None
}

/// Collapse `Curried{,2,3}(f)(a1)..(an)` into `f(a1, .., an)` and
/// `Tupled(f)([a...])` into `f(a...)`.
fn try_collapse(outer_target: &Expr, outer_args: &[Expr]) -> Option<Expr> {
    if outer_args.len() != 1 {
        return None;
    }
    let mut rev_args = vec![outer_args[0].clone()];
    let mut cur = outer_target.strip_span();
    loop {
        if let Some((f, kind)) = wrapper_info(cur) {
            let depth = rev_args.len();
            return match kind {
                WrapKind::Curried(n) if depth == n => {
                    rev_args.reverse();
                    Some(Expr::Application {
                        target: Box::new(f),
                        args: rev_args,
                        purity: Purity::NonPure,
                    })
                }
                WrapKind::Tupled if depth == 1 => match rev_args.pop().expect("one arg") {
                    Expr::NewArray(items) => Some(Expr::Application {
                        target: Box::new(f),
                        args: items,
                        purity: Purity::NonPure,
                    }),
                    _ => None,
                },
                _ => None,
            };
        }
        match cur {
            Expr::Application { target, args, .. } if args.len() == 1 => {
                rev_args.push(args[0].clone());
                cur = target.strip_span();
            }
            _ => return None,
        }
    }
}
