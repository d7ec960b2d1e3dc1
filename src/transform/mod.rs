//! ExprTree-to-ExprTree transformers that run between code generation
//! and emission. Both take the flat list of per-statement IR roots
//! produced by `direct_codegen`/`graph_codegen` and return a (possibly
//! longer) list with any nested or top-level stacks normalized away.
pub mod lifter;
pub mod stack_remover;

use crate::exprtree::ExprId;

/// One lowered assignment: `lhs = rhs`, in emission order. Distinct
/// from `ast::Stmt` in that both sides are IR nodes: `rhs` so passes
/// can rewrite it in place, and `lhs` (always an `Identifier` node) so
/// `StackExprRemover` can attach index annotations to the left-hand
/// side itself (its "extended identifier", e.g. `c[0]`) — a plain
/// `String` name cannot carry those. The list itself may grow
/// as passes splice in synthetic temporaries.
#[derive(Debug, Clone)]
pub struct IrAssignment {
    pub lhs: ExprId,
    pub expr: ExprId,
}
