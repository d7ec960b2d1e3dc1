//! The ExprTree IR and its arena.
//!
//! Distinct from the parse AST: every node carries its result
//! dimensions directly (no side-table lookup), and `Contraction` nodes
//! carry concrete left/right index lists instead of the AST's single
//! "list of lists" operand. Nodes are owned by an `ExprNodeBuilder`
//! arena and referenced by the index newtype `ExprId` rather than by
//! raw pointer: the arena is dropped as a single unit at the end of
//! code generation, and no node is ever individually freed.
//!
//! The kind list is `{Add, Sub, Mul, Div, ScalarMul, ScalarDiv,
//! Product, Contraction, Stack, Identifier}` plus `Transposition`,
//! which the lowering rule for `^` and the transposition scenario both
//! require even though it's easy to omit from a first pass at the
//! kind enumeration.
use crate::error::InternalError;

/// An index into an `ExprNodeBuilder`'s arena. Cheap to copy; stable
/// for the life of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

/// An index annotation introduced by stack removal (§4.5): either the
/// literal element index or a name carried over from a merged
/// synthetic identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAnnotation {
    Int(i64),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binary {
    pub left: ExprId,
    pub right: ExprId,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Add(Binary),
    Sub(Binary),
    Mul(Binary),
    Div(Binary),
    ScalarMul(Binary),
    ScalarDiv(Binary),
    Product(Binary),
    Contraction {
        lhs: ExprId,
        left_idx: Vec<usize>,
        rhs: ExprId,
        right_idx: Vec<usize>,
    },
    Stack(Vec<ExprId>),
    Transposition {
        operand: ExprId,
        pairs: Vec<(usize, usize)>,
    },
    Identifier {
        name: String,
        index_annotations: Vec<IndexAnnotation>,
    },
}

#[derive(Debug, Clone)]
pub struct ExprNode {
    kind: ExprKind,
    dims: Vec<u32>,
}

impl ExprNode {
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, ExprKind::Identifier { .. })
    }

    pub fn is_stack(&self) -> bool {
        matches!(self.kind, ExprKind::Stack(_))
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Owns every IR node created while lowering one compilation unit.
/// Dropping the builder frees every node it ever created, regardless
/// of whether it is still reachable from any assignment — the arena
/// itself is the unit of deallocation.
#[derive(Debug, Default)]
pub struct ExprNodeBuilder {
    nodes: Vec<ExprNode>,
}

impl ExprNodeBuilder {
    pub fn new() -> Self {
        ExprNodeBuilder::default()
    }

    pub fn node(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.0]
    }

    pub fn dims(&self, id: ExprId) -> &[u32] {
        self.nodes[id.0].dims()
    }

    fn push(&mut self, kind: ExprKind, dims: Vec<u32>) -> ExprId {
        let id = ExprId(self.nodes.len());
        self.nodes.push(ExprNode { kind, dims });
        id
    }

    pub fn identifier(&mut self, name: impl Into<String>, dims: Vec<u32>) -> ExprId {
        self.push(
            ExprKind::Identifier {
                name: name.into(),
                index_annotations: vec![],
            },
            dims,
        )
    }

    pub fn add(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let dims = self.dims(left).to_vec();
        self.push(ExprKind::Add(Binary { left, right }), dims)
    }

    pub fn sub(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let dims = self.dims(left).to_vec();
        self.push(ExprKind::Sub(Binary { left, right }), dims)
    }

    pub fn mul(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let dims = self.dims(left).to_vec();
        self.push(ExprKind::Mul(Binary { left, right }), dims)
    }

    pub fn div(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let dims = self.dims(left).to_vec();
        self.push(ExprKind::Div(Binary { left, right }), dims)
    }

    /// `left` is scalar; result carries `right`'s dims.
    pub fn scalar_mul(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let dims = self.dims(right).to_vec();
        self.push(ExprKind::ScalarMul(Binary { left, right }), dims)
    }

    /// `right` is scalar; result carries `left`'s dims.
    pub fn scalar_div(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let dims = self.dims(left).to_vec();
        self.push(ExprKind::ScalarDiv(Binary { left, right }), dims)
    }

    pub fn product(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let mut dims = self.dims(left).to_vec();
        dims.extend_from_slice(self.dims(right));
        self.push(ExprKind::Product(Binary { left, right }), dims)
    }

    /// Builds a `Contraction` node. `left_idx`/`right_idx` must already
    /// be adjusted to be relative to `lhs`/`rhs` respectively (the
    /// rebalancing in `direct_codegen`/`graph_codegen` is responsible
    /// for that adjustment; this constructor only checks the
    /// invariants that are cheap to check locally).
    pub fn contraction(
        &mut self,
        lhs: ExprId,
        left_idx: Vec<usize>,
        rhs: ExprId,
        right_idx: Vec<usize>,
    ) -> Result<ExprId, InternalError> {
        if left_idx.len() != right_idx.len() {
            return Err(InternalError::MismatchedIndexCounts {
                left: left_idx.len(),
                right: right_idx.len(),
            });
        }

        let ldims = self.dims(lhs).to_vec();
        let rdims = self.dims(rhs).to_vec();
        let rank_l = ldims.len();

        let mut dims: Vec<u32> = ldims.iter().chain(rdims.iter()).cloned().collect();
        let mut remove: Vec<usize> = left_idx
            .iter()
            .cloned()
            .chain(right_idx.iter().map(|&i| i + rank_l))
            .collect();
        remove.sort_unstable();
        for (removed_so_far, idx) in remove.into_iter().enumerate() {
            dims.remove(idx - removed_so_far);
        }

        Ok(self.push(
            ExprKind::Contraction {
                lhs,
                left_idx,
                rhs,
                right_idx,
            },
            dims,
        ))
    }

    pub fn stack(&mut self, members: Vec<ExprId>) -> ExprId {
        let mut dims = vec![members.len() as u32];
        dims.extend_from_slice(self.dims(members[0]));
        self.push(ExprKind::Stack(members), dims)
    }

    pub fn transposition(&mut self, operand: ExprId, pairs: Vec<(usize, usize)>) -> ExprId {
        let mut dims = self.dims(operand).to_vec();
        for &(i, j) in &pairs {
            dims.swap(i, j);
        }
        self.push(ExprKind::Transposition { operand, pairs }, dims)
    }

    /// The node's direct children, in order. Empty for `Identifier`.
    pub fn children(&self, id: ExprId) -> Vec<ExprId> {
        match &self.nodes[id.0].kind {
            ExprKind::Add(b)
            | ExprKind::Sub(b)
            | ExprKind::Mul(b)
            | ExprKind::Div(b)
            | ExprKind::ScalarMul(b)
            | ExprKind::ScalarDiv(b)
            | ExprKind::Product(b) => vec![b.left, b.right],
            ExprKind::Contraction { lhs, rhs, .. } => vec![*lhs, *rhs],
            ExprKind::Stack(members) => members.clone(),
            ExprKind::Transposition { operand, .. } => vec![*operand],
            ExprKind::Identifier { .. } => vec![],
        }
    }

    /// Overwrites child `index` of `parent` with `new_child`, the way
    /// `ExprNode::setChild` does in the original sources — used by
    /// transformers to splice a rewritten subtree back in.
    pub fn set_child(&mut self, parent: ExprId, index: usize, new_child: ExprId) {
        match &mut self.nodes[parent.0].kind {
            ExprKind::Add(b)
            | ExprKind::Sub(b)
            | ExprKind::Mul(b)
            | ExprKind::Div(b)
            | ExprKind::ScalarMul(b)
            | ExprKind::ScalarDiv(b)
            | ExprKind::Product(b) => match index {
                0 => b.left = new_child,
                1 => b.right = new_child,
                _ => panic!("binary node has no child {}", index),
            },
            ExprKind::Contraction { lhs, rhs, .. } => match index {
                0 => *lhs = new_child,
                1 => *rhs = new_child,
                _ => panic!("contraction node has no child {}", index),
            },
            ExprKind::Stack(members) => members[index] = new_child,
            ExprKind::Transposition { operand, .. } => match index {
                0 => *operand = new_child,
                _ => panic!("transposition node has no child {}", index),
            },
            ExprKind::Identifier { .. } => panic!("identifier node has no children"),
        }
    }

    pub fn add_index_annotation(&mut self, id: ExprId, annotation: IndexAnnotation) {
        match &mut self.nodes[id.0].kind {
            ExprKind::Identifier {
                index_annotations, ..
            } => index_annotations.push(annotation),
            _ => panic!("index annotations only apply to identifier nodes"),
        }
    }

    pub fn index_annotations(&self, id: ExprId) -> &[IndexAnnotation] {
        match &self.nodes[id.0].kind {
            ExprKind::Identifier {
                index_annotations, ..
            } => index_annotations,
            _ => &[],
        }
    }

    /// The textual name an `Emitter` should see for identifier `id`:
    /// its bare name, with every index annotation appended as a
    /// bracketed suffix (e.g. `c` with annotations `[Int(0)]` renders
    /// as `c[0]`). Temporary names are opaque to the `Emitter`, so
    /// this rendering is this crate's own choice, not a format any
    /// back end is required to parse.
    pub fn emit_name(&self, id: ExprId) -> String {
        let mut name = self
            .node(id)
            .name()
            .expect("emit_name only applies to identifier nodes")
            .to_string();
        for annotation in self.index_annotations(id) {
            match annotation {
                IndexAnnotation::Int(i) => name.push_str(&format!("[{}]", i)),
                IndexAnnotation::Name(n) => name.push_str(&format!("[{}]", n)),
            }
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_concatenates_dims() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![4, 5]);
        let r = b.identifier("b", vec![5, 6]);
        let p = b.product(a, r);
        assert_eq!(b.dims(p), &[4, 5, 5, 6]);
    }

    #[test]
    fn contraction_removes_matched_positions() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![4, 5]);
        let r = b.identifier("b", vec![5, 6]);
        let c = b.contraction(a, vec![1], r, vec![0]).unwrap();
        assert_eq!(b.dims(c), &[4, 6]);
    }

    #[test]
    fn mismatched_index_counts_is_internal_error() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![4, 5]);
        let r = b.identifier("b", vec![5]);
        let err = b.contraction(a, vec![0, 1], r, vec![0]).unwrap_err();
        assert_eq!(
            err,
            InternalError::MismatchedIndexCounts { left: 2, right: 1 }
        );
    }

    #[test]
    fn stack_adds_leading_dim() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2]);
        let c = b.identifier("c", vec![2]);
        let s = b.stack(vec![a, c]);
        assert_eq!(b.dims(s), &[2, 2]);
    }

    #[test]
    fn transposition_swaps_positions() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2, 3, 4]);
        let t = b.transposition(a, vec![(1, 2)]);
        assert_eq!(b.dims(t), &[2, 4, 3]);
    }

    #[test]
    fn set_child_splices_new_subtree() {
        let mut b = ExprNodeBuilder::new();
        let a = b.identifier("a", vec![2]);
        let c = b.identifier("c", vec![2]);
        let add = b.add(a, c);
        let d = b.identifier("d", vec![2]);
        b.set_child(add, 1, d);
        assert_eq!(b.children(add), vec![a, d]);
    }
}
