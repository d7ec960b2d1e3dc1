//! DirectCodeGen: translates a type-checked AST expression into an
//! `ExprTree`, rebalancing contraction index pairs across product trees
//! as it goes.
use crate::ast::{self, BinOp, Expr};
use crate::contraction::{self, Pair};
use crate::emit::{ElemOp, Emitter};
use crate::error::InternalError;
use crate::exprtree::{Binary, ExprKind, ExprNodeBuilder};
pub use crate::exprtree::ExprId;
use crate::indexlist::list_of_lists;
use crate::sema::SemaOutput;
use crate::transform::IrAssignment;
use fxhash::FxHashMap;
use log::debug;

/// Lowers every statement in `program`, in source order, into the
/// `ExprTree` IR. Returns the arena together with one `IrAssignment`
/// per statement — the flat, pre-transform list `transform::stack_remover`
/// consumes (§4.5). `sema` must have been produced by analyzing the
/// same `program`, since `DirectCodeGen::translate` looks up expression
/// types by AST node address.
pub fn lower_program<'a>(
    program: &'a ast::Program,
    sema: &SemaOutput<'a>,
) -> Result<(ExprNodeBuilder, Vec<IrAssignment>), InternalError> {
    let mut gen = DirectCodeGen::new(sema);
    let mut assignments = Vec::new();
    for s in program.stmts() {
        debug!("direct_codegen: lowering assignment to '{}'", s.id);
        let rhs = gen.translate(&s.expr)?;
        let dims = gen.builder.dims(rhs).to_vec();
        let lhs = gen.builder.identifier(s.id.clone(), dims);
        assignments.push(IrAssignment { lhs, expr: rhs });
    }
    Ok((gen.into_builder(), assignments))
}

pub struct DirectCodeGen<'a> {
    sema: &'a SemaOutput<'a>,
    builder: ExprNodeBuilder,
}

impl<'a> DirectCodeGen<'a> {
    pub fn new(sema: &'a SemaOutput<'a>) -> Self {
        DirectCodeGen {
            sema,
            builder: ExprNodeBuilder::new(),
        }
    }

    pub fn into_builder(self) -> ExprNodeBuilder {
        self.builder
    }

    pub fn builder(&self) -> &ExprNodeBuilder {
        &self.builder
    }

    fn rank_of(&self, expr: &'a Expr) -> usize {
        rank_of(self.sema, expr)
    }

    /// Translates a type-checked tensor expression into an `ExprId`.
    pub fn translate(&mut self, expr: &'a Expr) -> Result<ExprId, InternalError> {
        match expr {
            Expr::Identifier(name) => {
                let dims = self
                    .sema
                    .type_of(expr)
                    .map(|t| t.dims().to_vec())
                    .unwrap_or_default();
                Ok(self.builder.identifier(name.clone(), dims))
            }
            // Integer literals have no dedicated IR node; they lower to
            // a scalar identifier named after their own literal text,
            // which `Emitter`s are free to emit verbatim (this mirrors
            // how `TheanoEmitter.cpp` special-cases identifier nodes).
            Expr::Integer(value) => Ok(self.builder.identifier(value.to_string(), vec![])),
            Expr::Paren(inner) => self.translate(inner),
            Expr::Brack(members) => {
                let ids: Vec<ExprId> = members
                    .iter()
                    .map(|m| self.translate(m))
                    .collect::<Result<_, _>>()?;
                Ok(self.builder.stack(ids))
            }
            Expr::Binary(BinOp::Product, l, r) => {
                let l_id = self.translate(l)?;
                let r_id = self.translate(r)?;
                Ok(self.builder.product(l_id, r_id))
            }
            Expr::Binary(BinOp::Add, l, r) => {
                let l_id = self.translate(l)?;
                let r_id = self.translate(r)?;
                Ok(self.builder.add(l_id, r_id))
            }
            Expr::Binary(BinOp::Sub, l, r) => {
                let l_id = self.translate(l)?;
                let r_id = self.translate(r)?;
                Ok(self.builder.sub(l_id, r_id))
            }
            Expr::Binary(BinOp::Mul, l, r) => {
                let l_scalar = self.rank_of(l) == 0;
                let l_id = self.translate(l)?;
                let r_id = self.translate(r)?;
                Ok(if l_scalar {
                    self.builder.scalar_mul(l_id, r_id)
                } else {
                    self.builder.mul(l_id, r_id)
                })
            }
            Expr::Binary(BinOp::Div, l, r) => {
                let r_scalar = self.rank_of(r) == 0;
                let l_id = self.translate(l)?;
                let r_id = self.translate(r)?;
                Ok(if r_scalar {
                    self.builder.scalar_div(l_id, r_id)
                } else {
                    self.builder.div(l_id, r_id)
                })
            }
            Expr::Binary(BinOp::Contraction, l, r) => self.translate_contraction(l, r),
            Expr::Binary(BinOp::Transposition, l, r) => self.translate_transposition(l, r),
        }
    }

    /// `l . r`. Sema has already rejected any `Contraction` node whose
    /// right operand does not parse as a non-empty list of index pairs,
    /// so lowering may assume it does and does not repeat that
    /// validation here.
    fn translate_contraction(&mut self, l: &'a Expr, r: &'a Expr) -> Result<ExprId, InternalError> {
        let lists = list_of_lists(r).expect("Sema guarantees a list-of-lists contraction rhs");
        let pairs = contraction::validate_pairs(&lists)?;
        self.visit_contraction(l, &pairs)
    }

    /// The general contraction, recursively rebalancing `pairs`
    /// (expressed relative to `tensor_expr`'s own dimension vector)
    /// across the product tree rooted at `tensor_expr`.
    ///
    /// `pairs` partitions into three buckets relative to the product's
    /// left operand rank `rank_l`: pairs entirely on the left (self-
    /// contractions of the left operand), entirely on the right (self-
    /// contractions of the right operand, shifted by `-rank_l` to be
    /// expressed relative to the right operand alone — this is the
    /// DirectCodeGen shift; `graph_codegen` uses a different one, see
    /// its module docs), and mixed pairs that become the contraction
    /// actually emitted at this node.
    fn visit_contraction(
        &mut self,
        tensor_expr: &'a Expr,
        pairs: &[Pair],
    ) -> Result<ExprId, InternalError> {
        let (l, r) = match extract_product(tensor_expr) {
            Some(lr) => lr,
            None => return Err(InternalError::ContractionOverNonProduct),
        };
        let rank_l = self.rank_of(l);

        let partition = contraction::partition_pairs(rank_l, pairs);

        let l_id = if partition.left.is_empty() {
            self.translate(l)?
        } else {
            self.visit_contraction(l, &partition.left)?
        };

        let shifted_right = contraction::shift_pairs(&partition.right, -(rank_l as isize));
        let r_id = if shifted_right.is_empty() {
            self.translate(r)?
        } else {
            self.visit_contraction(r, &shifted_right)?
        };

        let left_removed: Vec<usize> = partition.left.iter().flat_map(|&(a, b)| vec![a, b]).collect();
        let right_removed: Vec<usize> = shifted_right.iter().flat_map(|&(a, b)| vec![a, b]).collect();

        let mut left_idx: Vec<usize> = partition.mixed.iter().map(|&(a, _)| a).collect();
        let mut right_idx: Vec<usize> = partition
            .mixed
            .iter()
            .map(|&(_, b)| b - rank_l)
            .collect();

        contraction::adjust_for_contractions(&mut left_idx, &left_removed);
        contraction::adjust_for_contractions(&mut right_idx, &right_removed);

        self.builder.contraction(l_id, left_idx, r_id, right_idx)
    }

    /// `l ^ r`, where `r` is a list of index pairs into `l`'s dimension
    /// vector to swap. Sema has already validated `r`'s shape.
    fn translate_transposition(
        &mut self,
        l: &'a Expr,
        r: &'a Expr,
    ) -> Result<ExprId, InternalError> {
        let lists = list_of_lists(r).expect("Sema guarantees a list-of-pairs transposition rhs");
        let pairs: Vec<(usize, usize)> = lists.into_iter().map(|p| (p[0], p[1])).collect();
        let l_id = self.translate(l)?;
        Ok(self.builder.transposition(l_id, pairs))
    }
}

/// The rank Sema recorded for `expr`, or 0 if `expr` was never typed
/// (the literal index lists that are a contraction/transposition's
/// right operand are never visited as tensor values). Shared with
/// `graph_codegen`, which needs the same left-operand rank to find the
/// same pivot §4.4/§4.6 both partition on.
pub(crate) fn rank_of(sema: &SemaOutput, expr: &Expr) -> usize {
    sema.type_of(expr).map(|t| t.rank()).unwrap_or(0)
}

/// Unwraps `Paren` and returns the operands of a `Product` node, if
/// `expr` resolves to one. Shared with `graph_codegen`, which performs
/// the same extraction before network-contraction recursion.
pub(crate) fn extract_product(expr: &Expr) -> Option<(&Expr, &Expr)> {
    match expr {
        Expr::Paren(inner) => extract_product(inner),
        Expr::Binary(BinOp::Product, l, r) => Some((l, r)),
        _ => None,
    }
}

/// Drives `emitter` to realize every lowered assignment, in order —
/// the back half that makes the IR useful: a post-order walk handing
/// every node's already-emitted operand names to the one `Emitter`
/// call that node corresponds to. Shares nothing with
/// `graph_codegen`'s emission path: this walks IR that
/// `direct_codegen`/`transform` have already normalized (no
/// contraction rebalancing left to do, no `Stack` nodes once
/// `StackExprRemover` has run), where `graph_codegen` builds and
/// schedules its own network directly from the AST.
pub fn emit_assignments(
    builder: &ExprNodeBuilder,
    assignments: &[IrAssignment],
    emitter: &mut dyn Emitter,
) -> Result<(), InternalError> {
    let mut cache: FxHashMap<ExprId, String> = FxHashMap::default();
    for assignment in assignments {
        let rhs_name = emit_node(builder, assignment.expr, emitter, &mut cache)?;
        let lhs_name = builder.emit_name(assignment.lhs);
        emitter.assign(&lhs_name, &rhs_name);
    }
    Ok(())
}

/// Emits `id`'s operands (recursively, memoized by `cache` since the
/// arena allows a node to be the child of more than one parent) then
/// `id` itself, returning the temporary or variable name an `Emitter`
/// should use to refer to its value from here on.
fn emit_node(
    builder: &ExprNodeBuilder,
    id: ExprId,
    emitter: &mut dyn Emitter,
    cache: &mut FxHashMap<ExprId, String>,
) -> Result<String, InternalError> {
    if let Some(name) = cache.get(&id) {
        return Ok(name.clone());
    }
    let name = match builder.node(id).kind() {
        ExprKind::Identifier { .. } => builder.emit_name(id),
        ExprKind::Add(b) => emit_elementwise(builder, *b, ElemOp::Add, emitter, cache)?,
        ExprKind::Sub(b) => emit_elementwise(builder, *b, ElemOp::Sub, emitter, cache)?,
        ExprKind::Mul(b) => emit_elementwise(builder, *b, ElemOp::Mul, emitter, cache)?,
        ExprKind::Div(b) => emit_elementwise(builder, *b, ElemOp::Div, emitter, cache)?,
        ExprKind::ScalarMul(b) => emit_elementwise(builder, *b, ElemOp::ScalarMul, emitter, cache)?,
        ExprKind::ScalarDiv(b) => emit_elementwise(builder, *b, ElemOp::ScalarDiv, emitter, cache)?,
        ExprKind::Product(b) => {
            let left = emit_node(builder, b.left, emitter, cache)?;
            let right = emit_node(builder, b.right, emitter, cache)?;
            let out = emitter.fresh_temp();
            emitter.product(&out, &left, &right);
            out
        }
        ExprKind::Contraction {
            lhs,
            left_idx,
            rhs,
            right_idx,
        } => {
            let left = emit_node(builder, *lhs, emitter, cache)?;
            let right = emit_node(builder, *rhs, emitter, cache)?;
            let out = emitter.fresh_temp();
            emitter.contract(&out, &left, left_idx, &right, right_idx);
            out
        }
        ExprKind::Stack(members) => {
            let members = members.clone();
            let names: Vec<String> = members
                .iter()
                .map(|&m| emit_node(builder, m, emitter, cache))
                .collect::<Result<_, _>>()?;
            let out = emitter.fresh_temp();
            emitter.stack(&out, &names);
            out
        }
        ExprKind::Transposition { operand, pairs } => {
            let operand = emit_node(builder, *operand, emitter, cache)?;
            let out = emitter.fresh_temp();
            emitter.transposition(&out, &operand, pairs);
            out
        }
    };
    cache.insert(id, name.clone());
    Ok(name)
}

fn emit_elementwise(
    builder: &ExprNodeBuilder,
    binary: Binary,
    op: ElemOp,
    emitter: &mut dyn Emitter,
    cache: &mut FxHashMap<ExprId, String>,
) -> Result<String, InternalError> {
    let left = emit_node(builder, binary.left, emitter, cache)?;
    let right = emit_node(builder, binary.right, emitter, cache)?;
    let out = emitter.fresh_temp();
    emitter.elementwise(&out, op, &left, &right);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::exprtree::ExprKind;
    use crate::sema;

    #[test]
    fn scalar_contraction_of_two_vectors() {
        let p = Program {
            items: vec![
                Item::Decl(var_decl("a", dims(vec![3]), Some(IoFlag::Input))),
                Item::Decl(var_decl("b", dims(vec![3]), Some(IoFlag::Input))),
                Item::Decl(var_decl("c", dims(vec![]), Some(IoFlag::Output))),
                Item::Stmt(stmt(
                    "c",
                    bin(
                        BinOp::Contraction,
                        bin(BinOp::Product, id("a"), id("b")),
                        index_lists(vec![vec![0, 1]]),
                    ),
                )),
            ],
        };
        let sema_out = sema::analyze(&p).unwrap();
        let s = p.stmts().next().unwrap();
        let mut gen = DirectCodeGen::new(&sema_out);
        let root = gen.translate(&s.expr).unwrap();
        let builder = gen.into_builder();
        assert_eq!(builder.dims(root), &[] as &[u32]);
        match builder.node(root).kind() {
            ExprKind::Contraction {
                left_idx, right_idx, ..
            } => {
                assert_eq!(left_idx, &[0]);
                assert_eq!(right_idx, &[0]);
            }
            other => panic!("expected Contraction, got {:?}", other),
        }
    }

    #[test]
    fn mixed_pair_contraction_over_product() {
        let p = Program {
            items: vec![
                Item::Decl(var_decl("a", dims(vec![4, 5]), Some(IoFlag::Input))),
                Item::Decl(var_decl("b", dims(vec![5, 6]), Some(IoFlag::Input))),
                Item::Decl(var_decl("c", dims(vec![4, 6]), Some(IoFlag::Output))),
                Item::Stmt(stmt(
                    "c",
                    bin(
                        BinOp::Contraction,
                        bin(BinOp::Product, id("a"), id("b")),
                        index_lists(vec![vec![1, 2]]),
                    ),
                )),
            ],
        };
        let sema_out = sema::analyze(&p).unwrap();
        let s = p.stmts().next().unwrap();
        let mut gen = DirectCodeGen::new(&sema_out);
        let root = gen.translate(&s.expr).unwrap();
        let builder = gen.into_builder();
        assert_eq!(builder.dims(root), &[4, 6]);
    }

    #[test]
    fn lower_program_builds_one_assignment_per_statement() {
        let p = Program {
            items: vec![
                Item::Decl(var_decl("a", dims(vec![3]), Some(IoFlag::Input))),
                Item::Decl(var_decl("b", dims(vec![3]), Some(IoFlag::Input))),
                Item::Decl(var_decl("c", dims(vec![3]), Some(IoFlag::Output))),
                Item::Stmt(stmt("c", bin(BinOp::Add, id("a"), id("b")))),
            ],
        };
        let sema_out = sema::analyze(&p).unwrap();
        let (builder, assignments) = super::lower_program(&p, &sema_out).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(builder.emit_name(assignments[0].lhs), "c");
        assert_eq!(builder.dims(assignments[0].expr), &[3]);
    }

    #[test]
    fn transposition_swaps_dims() {
        let p = Program {
            items: vec![
                Item::Decl(var_decl("a", dims(vec![2, 3]), Some(IoFlag::Input))),
                Item::Decl(var_decl("c", dims(vec![3, 2]), Some(IoFlag::Output))),
                Item::Stmt(stmt(
                    "c",
                    bin(BinOp::Transposition, id("a"), index_lists(vec![vec![0, 1]])),
                )),
            ],
        };
        let sema_out = sema::analyze(&p).unwrap();
        let s = p.stmts().next().unwrap();
        let mut gen = DirectCodeGen::new(&sema_out);
        let root = gen.translate(&s.expr).unwrap();
        let builder = gen.into_builder();
        assert_eq!(builder.dims(root), &[3, 2]);
    }

    #[test]
    fn emit_assignments_drives_contract_then_assign() {
        use crate::emit::StringEmitter;

        let p = Program {
            items: vec![
                Item::Decl(var_decl("a", dims(vec![3]), Some(IoFlag::Input))),
                Item::Decl(var_decl("b", dims(vec![3]), Some(IoFlag::Input))),
                Item::Decl(var_decl("c", dims(vec![]), Some(IoFlag::Output))),
                Item::Stmt(stmt(
                    "c",
                    bin(
                        BinOp::Contraction,
                        bin(BinOp::Product, id("a"), id("b")),
                        index_lists(vec![vec![0, 1]]),
                    ),
                )),
            ],
        };
        let sema_out = sema::analyze(&p).unwrap();
        let (builder, assignments) = super::lower_program(&p, &sema_out).unwrap();
        let mut emitter = StringEmitter::new();
        super::emit_assignments(&builder, &assignments, &mut emitter).unwrap();
        assert_eq!(emitter.log, vec![
            "__t0 = contract(a, [0], b, [0])".to_string(),
            "c = __t0".to_string(),
        ]);
    }
}
