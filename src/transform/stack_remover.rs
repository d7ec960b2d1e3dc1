//! `StackExprRemover`: normalizes every `Stack` node in a list of
//! lowered assignments so it disappears, replaced by one assignment
//! per member with an extended left-hand-side identifier carrying an
//! index annotation.
//!
//! Three phases:
//!
//! - Phase A: lift every nested `Stack` subtree to a fresh top-level
//!   temporary (`transform::lifter::lift_nested` with the `is_stack`
//!   predicate), so every `Stack` left in the assignment list sits at
//!   the root of some right-hand side.
//! - Phase B: for each remaining `lhs = Stack([c0..ck-1])`, build an
//!   extended identifier per member — the left-hand side's own name,
//!   dims, and index annotations, plus a new trailing index `i` — then
//!   either record a *replacement* (if `cᵢ` is an identifier nobody
//!   declared, i.e. a Phase-A temporary: single definition, single
//!   use) or insert a brand new assignment `(extended-id, cᵢ)` right
//!   away. The original stack assignment is dropped.
//! - Phase C: apply every recorded replacement to the left- and
//!   right-hand sides of every surviving assignment, merging the
//!   replaced occurrence's own index annotations after the
//!   replacement target's.
//!
//! The extended identifier here carries the *member's* dims, since
//! this crate's `ExprNode::dims` always means "the rank this node
//! actually denotes here" and every other pass relies on that.
use std::collections::{HashMap, HashSet};

use crate::exprtree::{ExprId, ExprKind, ExprNodeBuilder, IndexAnnotation};
use crate::transform::lifter::{lift_nested, TempNamer};
use crate::transform::IrAssignment;

/// What a replaced synthetic name is rewritten to: the target
/// identifier's name, dims, and the index annotations it already
/// carried when the replacement was recorded (its own trailing index
/// is already included here; see `expand_stack`).
struct Replacement {
    name: String,
    dims: Vec<u32>,
    annotations: Vec<IndexAnnotation>,
}

/// Runs stack removal over `assignments`, returning a new, possibly
/// longer list in which no right-hand side is a `Stack`. `declared_ids`
/// names the symbols actually declared in the source program — only an
/// identifier *outside* that set is eligible to be folded away by a
/// replacement rather than given its own assignment.
pub fn remove_stacks(
    builder: &mut ExprNodeBuilder,
    assignments: Vec<IrAssignment>,
    declared_ids: &HashSet<String>,
    lift_nested_stacks: bool,
) -> Vec<IrAssignment> {
    let mut namer = TempNamer::new("__stack_tmp");

    // Phase A: lift nested stacks to the top level.
    let mut working = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        if lift_nested_stacks {
            let mut lifted = Vec::new();
            lift_nested(
                builder,
                assignment.expr,
                &|b, id| b.node(id).is_stack(),
                &mut namer,
                &mut lifted,
            );
            working.extend(lifted);
        }
        working.push(assignment);
    }

    // Phase B: expand every remaining top-level stack assignment.
    let mut replacements: HashMap<String, Replacement> = HashMap::new();
    let mut output = Vec::with_capacity(working.len());
    for assignment in working {
        if !builder.node(assignment.expr).is_stack() {
            output.push(assignment);
            continue;
        }
        expand_stack(builder, &assignment, declared_ids, &mut replacements, &mut output);
    }

    // Phase C: apply replacements to every surviving lhs and rhs.
    for assignment in output.iter_mut() {
        assignment.lhs = substitute(builder, assignment.lhs, &replacements);
        assignment.expr = substitute(builder, assignment.expr, &replacements);
    }

    output
}

/// Expands one `lhs = Stack([c0..])` assignment, pushing either
/// nothing (for replaced synthetic members) or a fresh assignment
/// (for everything else) onto `output`.
fn expand_stack(
    builder: &mut ExprNodeBuilder,
    assignment: &IrAssignment,
    declared_ids: &HashSet<String>,
    replacements: &mut HashMap<String, Replacement>,
    output: &mut Vec<IrAssignment>,
) {
    let lhs_name = builder
        .node(assignment.lhs)
        .name()
        .expect("assignment lhs must be an identifier")
        .to_string();
    let lhs_annotations = builder.index_annotations(assignment.lhs).to_vec();
    let members = builder.children(assignment.expr);

    for (index, member) in members.into_iter().enumerate() {
        let mut annotations = lhs_annotations.clone();
        annotations.push(IndexAnnotation::Int(index as i64));
        let member_dims = builder.dims(member).to_vec();

        let undeclared_identifier = match builder.node(member).kind() {
            ExprKind::Identifier { name, .. } => !declared_ids.contains(name),
            _ => false,
        };

        if undeclared_identifier {
            let synth_name = builder.node(member).name().unwrap().to_string();
            replacements.insert(
                synth_name,
                Replacement {
                    name: lhs_name.clone(),
                    dims: member_dims,
                    annotations,
                },
            );
        } else {
            let id = builder.identifier(lhs_name.clone(), member_dims);
            for annotation in annotations {
                builder.add_index_annotation(id, annotation);
            }
            output.push(IrAssignment { lhs: id, expr: member });
        }
    }
}

/// Recursively rewrites `id`'s descendants, then `id` itself if it is
/// an identifier whose name is a recorded replacement. Splices
/// rewritten children back in via `set_child`, returning the
/// (possibly new) id for `id`'s own position — callers at the root of
/// an assignment use the return value directly; callers in the middle
/// of a tree rely on the `set_child` already performed by the parent
/// frame of this same function.
fn substitute(builder: &mut ExprNodeBuilder, id: ExprId, replacements: &HashMap<String, Replacement>) -> ExprId {
    for (index, child) in builder.children(id).into_iter().enumerate() {
        let new_child = substitute(builder, child, replacements);
        if new_child != child {
            builder.set_child(id, index, new_child);
        }
    }

    let name = match builder.node(id).name() {
        Some(n) => n.to_string(),
        None => return id,
    };
    let target = match replacements.get(&name) {
        Some(t) => t,
        None => return id,
    };

    let mut annotations = target.annotations.clone();
    annotations.extend(builder.index_annotations(id).iter().cloned());
    let replacement = builder.identifier(target.name.clone(), target.dims.clone());
    for annotation in annotations {
        builder.add_index_annotation(replacement, annotation);
    }
    replacement
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_members_get_fresh_indexed_assignments() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2]);
        let c = b.identifier("c", vec![2]);
        let stack = b.stack(vec![a, c]);
        let lhs = b.identifier("c", vec![2, 2]);
        let mut declared = HashSet::new();
        declared.insert("a".to_string());
        declared.insert("c".to_string());

        let out = remove_stacks(
            &mut b,
            vec![IrAssignment { lhs, expr: stack }],
            &declared,
            true,
        );

        assert_eq!(out.len(), 2);
        assert_eq!(b.emit_name(out[0].lhs), "c[0]");
        assert_eq!(out[0].expr, a);
        assert_eq!(b.emit_name(out[1].lhs), "c[1]");
        assert_eq!(out[1].expr, c);
    }

    #[test]
    fn synthetic_member_is_folded_without_extra_assignment() {
        // c = [t0, t1] where t0/t1 were inserted by phase A lifting
        // a+b / a-b; after removal only c[0]=a+b and c[1]=a-b remain.
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2]);
        let bb = b.identifier("b", vec![2]);
        let sum = b.add(a, bb);
        let diff = b.sub(a, bb);
        let t0 = b.identifier("__stack_tmp0", vec![2]);
        let t1 = b.identifier("__stack_tmp1", vec![2]);
        let stack = b.stack(vec![t0, t1]);
        let lhs = b.identifier("c", vec![2, 2]);

        let declared = {
            let mut s = HashSet::new();
            s.insert("a".to_string());
            s.insert("b".to_string());
            s.insert("c".to_string());
            s
        };

        let out = remove_stacks(
            &mut b,
            vec![
                IrAssignment { lhs: t0, expr: sum },
                IrAssignment { lhs: t1, expr: diff },
                IrAssignment { lhs, expr: stack },
            ],
            &declared,
            true,
        );

        assert_eq!(out.len(), 2);
        assert_eq!(b.emit_name(out[0].lhs), "c[0]");
        assert_eq!(out[0].expr, sum);
        assert_eq!(b.emit_name(out[1].lhs), "c[1]");
        assert_eq!(out[1].expr, diff);
    }

    #[test]
    fn nested_stack_is_lifted_before_expansion() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2]);
        let c = b.identifier("c", vec![2]);
        let inner = b.stack(vec![a, c]);
        let d = b.identifier("d", vec![2, 2]);
        let root = b.add(inner, d);
        let lhs = b.identifier("r", vec![2, 2]);
        let declared = {
            let mut s = HashSet::new();
            s.insert("a".to_string());
            s.insert("c".to_string());
            s.insert("d".to_string());
            s
        };

        let out = remove_stacks(
            &mut b,
            vec![IrAssignment { lhs, expr: root }],
            &declared,
            true,
        );

        // Phase A lifts `inner` to a synthetic temp `__stack_tmp0 = [a,c]`,
        // leaving `r = __stack_tmp0 + d`. That synthetic stack is itself
        // expanded by phase B (its lhs is undeclared, so expansion
        // applies to it too): `__stack_tmp0[0] = a`, `__stack_tmp0[1] = c`,
        // then `r = __stack_tmp0 + d` survives unchanged since its rhs is
        // not itself a stack.
        assert_eq!(out.len(), 3);
        assert_eq!(b.emit_name(out[0].lhs), "__stack_tmp0[0]");
        assert_eq!(out[0].expr, a);
        assert_eq!(b.emit_name(out[1].lhs), "__stack_tmp0[1]");
        assert_eq!(out[1].expr, c);
        assert!(!b.node(out[2].expr).is_stack());
    }
}
