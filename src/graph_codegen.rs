//! GraphCodeGen: an alternative, self-contained back end that lowers
//! straight from the AST to `Emitter` calls through a tensor-network
//! graph, rather than through the `ExprTree` IR that
//! `direct_codegen`/`transform` build. This crate keeps the two as
//! independently callable entry points instead of chaining one's
//! output into the other — see DESIGN.md for the reasoning.
//!
//! Every statement gets its own fresh `TensorGraph`. Identifiers and
//! chains of `Product`/`Contraction` participate directly in that
//! graph (their legs stay addressable so a contraction anywhere in the
//! chain can reach them); anything else (`Add`/`Sub`/`Mul`/`Div`,
//! `Brack` stacks, `Transposition`) is lowered in its own nested graph,
//! reduced to a single temporary, and re-enters the caller's graph as
//! an opaque leaf node, always emitting the sub-expression before
//! building a node for it.
//!
//! Index bookkeeping for contraction (`network_contraction` below)
//! mirrors `direct_codegen::visit_contraction` exactly, including the
//! `-rank_l` shift used both to recurse into the right operand and to
//! translate a mixed pair's right-hand index into the right operand's
//! own numbering: a leg's position within `r` never depends on how `l`
//! happens to be reduced, so the two passes share one shift amount
//! here despite building different IRs.
use crate::ast::{self, BinOp, Expr};
use crate::contraction::{self, Pair};
use crate::direct_codegen::{extract_product, rank_of};
use crate::emit::{ElemOp, Emitter};
use crate::error::{CoreError, InternalError};
use crate::graph::{EdgeId, NodeId, TensorGraph};
use crate::indexlist::list_of_lists;
use crate::sema::SemaOutput;
use log::debug;

/// One exposed dimension of the sub-expression currently being lowered
/// into a graph: which node it lives on, and which of that node's legs
/// it is. Concatenation of two expressions' legs (e.g. across a
/// `Product`) is just `Vec` concatenation.
type Legs = Vec<(NodeId, usize)>;

/// Lowers every statement in `program`, in source order, straight to
/// `emitter` calls via the tensor-network strategy. Stack handling here
/// goes through the network and `Emitter::stack` directly, never
/// through `transform::stack_remover`.
pub fn lower_program(
    program: &ast::Program,
    sema: &SemaOutput,
    emitter: &mut dyn Emitter,
) -> Result<(), CoreError> {
    for decl in program.decls() {
        if let ast::DeclKind::Variable = decl.kind {
            if let Some(sym) = sema.symbols.get_symbol(&decl.id) {
                emitter.declare_variable(&decl.id, sym.ty().dims(), decl.io);
            }
        }
    }

    for stmt in program.stmts() {
        debug!("graph_codegen: lowering assignment to '{}'", stmt.id);
        let (rhs_name, _rank) = emit_expr(sema, emitter, &stmt.expr)?;
        emitter.assign(&stmt.id, &rhs_name);
    }
    Ok(())
}

/// Lowers `expr` into a fresh graph of its own and reduces it to a
/// single temporary (or variable) name — the function every "opaque
/// leaf" case below calls on its operands, and the one the top-level
/// per-statement driver calls on the whole right-hand side.
fn emit_expr(
    sema: &SemaOutput,
    emitter: &mut dyn Emitter,
    expr: &Expr,
) -> Result<(String, usize), CoreError> {
    let mut graph = TensorGraph::new();
    let legs = lower_into(&mut graph, sema, emitter, expr)?;
    let rank = legs.len();
    let name = emit_graph(&mut graph, emitter)?;
    Ok((name, rank))
}

/// The AST visitor of §4.6: walks `expr` into `graph`, returning the
/// legs it exposes. `Identifier`/`Integer`/`Paren`/`Product`/
/// `Contraction` are handled directly against `graph`; every other
/// kind is delegated to `emit_expr` and re-enters as one opaque node.
fn lower_into(
    graph: &mut TensorGraph,
    sema: &SemaOutput,
    emitter: &mut dyn Emitter,
    expr: &Expr,
) -> Result<Legs, CoreError> {
    match expr {
        Expr::Identifier(name) => {
            let rank = rank_of(sema, expr);
            let node = graph.add_node(name.clone(), rank);
            Ok((0..rank).map(|i| (node, i)).collect())
        }
        Expr::Integer(value) => {
            graph.add_node(value.to_string(), 0);
            Ok(Vec::new())
        }
        Expr::Paren(inner) => lower_into(graph, sema, emitter, inner),
        Expr::Binary(BinOp::Product, l, r) => {
            let mut legs = lower_into(graph, sema, emitter, l)?;
            legs.extend(lower_into(graph, sema, emitter, r)?);
            Ok(legs)
        }
        Expr::Binary(BinOp::Contraction, l, r) => {
            let lists = list_of_lists(r).expect("Sema guarantees a list-of-lists contraction rhs");
            let pairs = contraction::validate_pairs(&lists)?;
            network_contraction(graph, sema, emitter, l, &pairs)
        }
        Expr::Brack(members) => {
            let mut names = Vec::with_capacity(members.len());
            for m in members {
                let (name, _) = emit_expr(sema, emitter, m)?;
                names.push(name);
            }
            let out = emitter.fresh_temp();
            emitter.stack(&out, &names);
            let rank = rank_of(sema, expr);
            let node = graph.add_node(out, rank);
            Ok((0..rank).map(|i| (node, i)).collect())
        }
        Expr::Binary(BinOp::Transposition, l, r) => {
            let lists = list_of_lists(r).expect("Sema guarantees a list-of-pairs transposition rhs");
            let pairs: Vec<(usize, usize)> = lists.into_iter().map(|p| (p[0], p[1])).collect();
            let (operand, _) = emit_expr(sema, emitter, l)?;
            let out = emitter.fresh_temp();
            emitter.transposition(&out, &operand, &pairs);
            let rank = rank_of(sema, expr);
            let node = graph.add_node(out, rank);
            Ok((0..rank).map(|i| (node, i)).collect())
        }
        Expr::Binary(op, l, r) => {
            let elem_op = elementwise_op(sema, *op, l, r);
            let (left, _) = emit_expr(sema, emitter, l)?;
            let (right, _) = emit_expr(sema, emitter, r)?;
            let out = emitter.fresh_temp();
            emitter.elementwise(&out, elem_op, &left, &right);
            let rank = rank_of(sema, expr);
            let node = graph.add_node(out, rank);
            Ok((0..rank).map(|i| (node, i)).collect())
        }
    }
}

/// Selects `ElemOp::ScalarMul`/`ScalarDiv` exactly where
/// `direct_codegen::translate` does: a scalar left operand of `Mul`, or
/// a scalar right operand of `Div`.
fn elementwise_op(sema: &SemaOutput, op: BinOp, l: &Expr, r: &Expr) -> ElemOp {
    match op {
        BinOp::Add => ElemOp::Add,
        BinOp::Sub => ElemOp::Sub,
        BinOp::Mul if rank_of(sema, l) == 0 => ElemOp::ScalarMul,
        BinOp::Mul => ElemOp::Mul,
        BinOp::Div if rank_of(sema, r) == 0 => ElemOp::ScalarDiv,
        BinOp::Div => ElemOp::Div,
        BinOp::Product | BinOp::Contraction | BinOp::Transposition => {
            unreachable!("handled by dedicated match arms in lower_into")
        }
    }
}

/// Network contraction (§4.6): the same pivot/partition/shift
/// structure as `direct_codegen::visit_contraction` (§4.4), but
/// building graph edges instead of an IR `Contraction` node. `pairs`
/// are indices into the concatenated `l#r` dimension vector; `legs_l`/
/// `legs_r` are already reduced by any self-contraction recursed into
/// above, so the mixed indices are adjusted by `adjust_for_contractions`
/// before they can index into them.
fn network_contraction(
    graph: &mut TensorGraph,
    sema: &SemaOutput,
    emitter: &mut dyn Emitter,
    expr: &Expr,
    pairs: &[Pair],
) -> Result<Legs, CoreError> {
    let (l, r) = extract_product(expr).ok_or(InternalError::ContractionOverNonProduct)?;
    let rank_l = rank_of(sema, l);
    let partition = contraction::partition_pairs(rank_l, pairs);

    let legs_l = if partition.left.is_empty() {
        lower_into(graph, sema, emitter, l)?
    } else {
        network_contraction(graph, sema, emitter, l, &partition.left)?
    };

    let shifted_right = contraction::shift_pairs(&partition.right, -(rank_l as isize));
    let legs_r = if shifted_right.is_empty() {
        lower_into(graph, sema, emitter, r)?
    } else {
        network_contraction(graph, sema, emitter, r, &shifted_right)?
    };

    let left_removed: Vec<usize> = partition.left.iter().flat_map(|&(a, b)| vec![a, b]).collect();
    let right_removed: Vec<usize> = shifted_right.iter().flat_map(|&(a, b)| vec![a, b]).collect();

    let mut left_idx: Vec<usize> = partition.mixed.iter().map(|&(a, _)| a).collect();
    let mut right_idx: Vec<usize> = partition.mixed.iter().map(|&(_, b)| b - rank_l).collect();
    contraction::adjust_for_contractions(&mut left_idx, &left_removed);
    contraction::adjust_for_contractions(&mut right_idx, &right_removed);

    let split = legs_l.len();
    let mut legs: Legs = legs_l;
    legs.extend(legs_r);

    let mut contracted_positions: Vec<usize> = Vec::with_capacity(left_idx.len() * 2);
    for (&li, &ri) in left_idx.iter().zip(right_idx.iter()) {
        let (src_node, src_leg) = legs[li];
        let (tgt_node, tgt_leg) = legs[split + ri];
        graph.add_edge(src_node, src_leg, tgt_node, tgt_leg)?;
        contracted_positions.push(li);
        contracted_positions.push(split + ri);
    }

    contracted_positions.sort_unstable();
    contracted_positions.dedup();
    for &pos in contracted_positions.iter().rev() {
        legs.remove(pos);
    }
    Ok(legs)
}

/// Graph lowering (§4.6's `emitGraph`/§4.7): repeatedly selects the
/// first consecutive sequence pair with any edges between them and
/// contracts it, until no edges remain; then folds whatever sequence
/// is left into a single temporary with `Emitter::product` calls.
fn emit_graph(graph: &mut TensorGraph, emitter: &mut dyn Emitter) -> Result<String, CoreError> {
    while graph.has_edges() {
        contract_next_edge_set(graph, emitter)?;
    }

    let any = graph.any_node().expect("graph must have at least one node");
    let start = graph.start_node(any);
    let mut cur = start;
    let mut acc = graph.node(cur).repr.clone();
    while let Some(next) = graph.succ(cur) {
        let next_repr = graph.node(next).repr.clone();
        let out = emitter.fresh_temp();
        emitter.product(&out, &acc, &next_repr);
        acc = out;
        cur = next;
    }
    Ok(acc)
}

/// §4.7's edge-selection policy: walk the sequence from its start,
/// contracting the first consecutive pair with a non-empty edge set.
fn contract_next_edge_set(graph: &mut TensorGraph, emitter: &mut dyn Emitter) -> Result<(), CoreError> {
    let any = graph.any_node().expect("has_edges implies a live node exists");
    let mut cur = graph.start_node(any);
    loop {
        let succ = match graph.succ(cur) {
            Some(s) => s,
            None => {
                return Err(InternalError::MissingSequenceEdge {
                    src: graph.node(cur).repr.clone(),
                    tgt: "<end of sequence>".to_string(),
                }
                .into())
            }
        };
        let edges = graph.edges_between(cur, succ);
        if !edges.is_empty() {
            contract_pair(graph, emitter, cur, succ, &edges)?;
            return Ok(());
        }
        cur = succ;
    }
}

/// Contracts the consecutive pair `(src, tgt)` over `edges`: emits one
/// `Emitter::contract` call, splices a merged node into their sequence
/// position, and reattaches every leftover edge at its new leg
/// position on the merged node.
fn contract_pair(
    graph: &mut TensorGraph,
    emitter: &mut dyn Emitter,
    src: NodeId,
    tgt: NodeId,
    edges: &[EdgeId],
) -> Result<(), CoreError> {
    let src_rank = graph.node(src).rank();
    let tgt_rank = graph.node(tgt).rank();
    let src_repr = graph.node(src).repr.clone();
    let tgt_repr = graph.node(tgt).repr.clone();

    let mut src_legs = Vec::with_capacity(edges.len());
    let mut tgt_legs = Vec::with_capacity(edges.len());
    for &e in edges {
        let edge = *graph.edge(e);
        if edge.src == src {
            src_legs.push(edge.src_leg);
            tgt_legs.push(edge.tgt_leg);
        } else {
            src_legs.push(edge.tgt_leg);
            tgt_legs.push(edge.src_leg);
        }
    }

    let src_leftover: Vec<usize> = (0..src_rank).filter(|p| !src_legs.contains(p)).collect();
    let tgt_leftover: Vec<usize> = (0..tgt_rank).filter(|p| !tgt_legs.contains(p)).collect();

    // Record, before erasing anything, where each leftover edge's
    // *other* endpoint is and which leg of the about-to-exist merged
    // node it should move to.
    let mut carry: Vec<(NodeId, usize, usize)> = Vec::new();
    for (new_pos, &p) in src_leftover.iter().enumerate() {
        if let Some(e) = graph.node(src).leg(p) {
            let edge = *graph.edge(e);
            let (other, other_leg) = if edge.src == src {
                (edge.tgt, edge.tgt_leg)
            } else {
                (edge.src, edge.src_leg)
            };
            carry.push((other, other_leg, new_pos));
        }
    }
    for (new_pos, &p) in tgt_leftover.iter().enumerate() {
        if let Some(e) = graph.node(tgt).leg(p) {
            let edge = *graph.edge(e);
            let (other, other_leg) = if edge.src == tgt {
                (edge.tgt, edge.tgt_leg)
            } else {
                (edge.src, edge.src_leg)
            };
            carry.push((other, other_leg, src_leftover.len() + new_pos));
        }
    }

    let mut touched: Vec<EdgeId> = edges.to_vec();
    for &p in &src_leftover {
        if let Some(e) = graph.node(src).leg(p) {
            touched.push(e);
        }
    }
    for &p in &tgt_leftover {
        if let Some(e) = graph.node(tgt).leg(p) {
            touched.push(e);
        }
    }
    for e in touched {
        graph.erase_edge(e);
    }

    let out = emitter.fresh_temp();
    emitter.contract(&out, &src_repr, &src_legs, &tgt_repr, &tgt_legs);

    let new_rank = src_leftover.len() + tgt_leftover.len();
    let new_node = graph.add_detached_node(out, new_rank);
    graph.replace_sequence_pair(src, tgt, new_node);

    graph.erase_detached_node(src)?;
    graph.erase_detached_node(tgt)?;

    for (other, other_leg, new_leg) in carry {
        graph.add_edge(new_node, new_leg, other, other_leg)?;
    }

    Ok(())
}
