//! `ExprTreeLifter`: post-order extraction of subtrees matching a
//! predicate into fresh top-level temporaries. Used with
//! `is_stack` as the predicate — nested `Stack` subtrees are hoisted
//! out since an `Emitter` can only build a stack at the top of an
//! assignment, never as an operand buried inside other arithmetic.
use crate::exprtree::{ExprId, ExprNodeBuilder};
use crate::transform::IrAssignment;

/// Produces fresh, collision-free temporary names sharing one prefix.
pub struct TempNamer {
    prefix: &'static str,
    next: usize,
}

impl TempNamer {
    pub fn new(prefix: &'static str) -> Self {
        TempNamer { prefix, next: 0 }
    }

    pub fn fresh(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        name
    }
}

/// Walks every *strict* descendant of `root` post-order. Whenever a
/// node matching `predicate` is found, it is spliced out: a fresh
/// identifier of the same dims takes its place in the parent, and an
/// `IrAssignment` binding that identifier to the original subtree is
/// appended to `extracted` (in the order the assignments must be
/// emitted, i.e. innermost/earliest first).
///
/// `root` itself is never lifted — a `Stack` that is already the whole
/// right-hand side of an assignment needs no temporary.
pub fn lift_nested<F>(
    builder: &mut ExprNodeBuilder,
    root: ExprId,
    predicate: &F,
    namer: &mut TempNamer,
    extracted: &mut Vec<IrAssignment>,
) where
    F: Fn(&ExprNodeBuilder, ExprId) -> bool,
{
    for (index, child) in builder.children(root).into_iter().enumerate() {
        lift_nested(builder, child, predicate, namer, extracted);
        if predicate(builder, child) {
            let name = namer.fresh();
            let dims = builder.dims(child).to_vec();
            let lhs = builder.identifier(name.clone(), dims.clone());
            extracted.push(IrAssignment { lhs, expr: child });
            let replacement = builder.identifier(name, dims);
            builder.set_child(root, index, replacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exprtree::ExprNodeBuilder;

    #[test]
    fn lifts_nested_stack_but_not_root() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2]);
        let c = b.identifier("c", vec![2]);
        let inner_stack = b.stack(vec![a, c]);
        let d = b.identifier("d", vec![2, 2]);
        let root = b.add(inner_stack, d);

        let mut namer = TempNamer::new("__stack");
        let mut extracted = Vec::new();
        lift_nested(&mut b, root, &|bd, id| bd.node(id).is_stack(), &mut namer, &mut extracted);

        assert_eq!(extracted.len(), 1);
        assert_eq!(b.node(extracted[0].lhs).name(), Some("__stack0"));
        assert_eq!(extracted[0].expr, inner_stack);
        // root's first child is now the fresh identifier, not the stack.
        let new_children = b.children(root);
        assert_ne!(new_children[0], inner_stack);
        assert!(!b.node(root).is_stack());
    }

    #[test]
    fn root_level_stack_is_left_alone() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2]);
        let c = b.identifier("c", vec![2]);
        let root = b.stack(vec![a, c]);

        let mut namer = TempNamer::new("__stack");
        let mut extracted = Vec::new();
        lift_nested(&mut b, root, &|bd, id| bd.node(id).is_stack(), &mut namer, &mut extracted);

        assert!(extracted.is_empty());
        assert!(b.node(root).is_stack());
    }
}
