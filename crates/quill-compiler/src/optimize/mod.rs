//! The optimization chain.
//!
//! Passes run in a fixed order. For regular bodies: let-removal, runtime
//! cleaner, statement breaker, forced runtime cleaner, curried-function
//! collector (the collector skips the outermost function of constructor
//! bodies, whose object identity the runtime relies on). Inline bodies
//! only get let-removal and the inline optimizer, since they stay in
//! expression form for later substitution.

mod breaker;
mod cleaner;
mod curried;
mod let_removal;
mod verify;

pub use breaker::{InlineOptimizer, StatementBreaker};
pub use cleaner::RuntimeCleaner;
pub use curried::CurriedCollector;
pub use let_removal::LetRemoval;
pub use verify::invalid_forms;

use quill_ast::{Expr, Statement, Transformer};

/// What is being optimized; selects the pass chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Method,
    Constructor,
    Inline,
}

/// Run the pass chain over a compiled member body.
pub fn optimize_body(expr: Expr, kind: BodyKind) -> Expr {
    match kind {
        BodyKind::Inline => {
            let e = LetRemoval.transform_expr(expr);
            InlineOptimizer.transform_expr(e)
        }
        BodyKind::Method | BodyKind::Constructor => {
            let e = LetRemoval.transform_expr(expr);
            let e = RuntimeCleaner { force: false }.transform_expr(e);
            let e = StatementBreaker::break_body(e);
            let e = RuntimeCleaner { force: true }.transform_expr(e);
            CurriedCollector::new(kind == BodyKind::Constructor).run(e)
        }
    }
}

/// Run the pass chain over the entry-point statement.
pub fn optimize_statement(stmt: Statement) -> Statement {
    let s = LetRemoval.transform_statement(stmt);
    let s = RuntimeCleaner { force: false }.transform_statement(s);
    let s = StatementBreaker::break_top_statement(s);
    let s = RuntimeCleaner { force: true }.transform_statement(s);
    CurriedCollector::new(false).transform_statement(s)
}
