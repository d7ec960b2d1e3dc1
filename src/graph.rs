//! The tensor-network graph used by `graph_codegen`: nodes are operands
//! (an `Identifier` or an already-lowered sub-expression), edges are
//! contracted index pairs, and a doubly-linked sequence threads the
//! nodes in the order they appeared in the product chain so
//! contraction scheduling has a stable starting point.
//!
//! Nodes and edges live in arenas (`Vec<Option<_>>`) keyed by newtype
//! indices, and erasure clears the slot to `None` (a tombstone) rather
//! than freeing memory.
//!
//! Unlike `direct_codegen`, `graph_codegen` never builds an `ExprTree`
//! — it walks the AST directly and calls straight into an `Emitter`
//! (AST-to-graph-to-`Emitter`, not AST-to-IR-to-graph). So a
//! `GraphNode` carries the textual identifier an `Emitter` should see
//! for this operand rather than an `ExprId` into an arena that, in
//! this pipeline, does not exist.
use crate::error::InternalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(usize);

/// One operand of the tensor network: a leaf identifier name or a
/// previously-emitted temporary's name. `graph_codegen` is responsible
/// for tracking each node's own dims alongside the graph (the legs
/// vector here only records which ones are still contracted).
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub repr: String,
    /// One entry per rank position; `Some(edge)` if that leg is
    /// currently contracted, `None` if it is free (an output axis).
    legs: Vec<Option<EdgeId>>,
    pred: Option<NodeId>,
    succ: Option<NodeId>,
}

impl GraphNode {
    pub fn rank(&self) -> usize {
        self.legs.len()
    }

    pub fn leg(&self, index: usize) -> Option<EdgeId> {
        self.legs[index]
    }

    pub fn any_leg_set(&self) -> bool {
        self.legs.iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GraphEdge {
    pub src: NodeId,
    pub src_leg: usize,
    pub tgt: NodeId,
    pub tgt_leg: usize,
}

/// A tensor network under construction. Nodes are added in product-
/// chain order (maintaining the `pred`/`succ` sequence), edges record
/// contracted leg pairs, and both are erased as the schedule
/// progressively contracts nodes together.
#[derive(Debug, Default)]
pub struct TensorGraph {
    nodes: Vec<Option<GraphNode>>,
    edges: Vec<Option<GraphEdge>>,
}

impl TensorGraph {
    pub fn new() -> Self {
        TensorGraph::default()
    }

    /// Appends a node at the end of the sequence.
    pub fn add_node(&mut self, repr: impl Into<String>, rank: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        let pred = self.last_node();
        if let Some(p) = pred {
            self.node_mut(p).succ = Some(id);
        }
        self.nodes.push(Some(GraphNode {
            repr: repr.into(),
            legs: vec![None; rank],
            pred,
            succ: None,
        }));
        id
    }

    /// Creates a node with no sequence links of its own. Used when a
    /// contraction schedule merges two existing, already-linked nodes
    /// into one: the caller splices the new node into their old
    /// position with `replace_sequence_pair` instead of appending it at
    /// the end, so `add_node`'s automatic "link after the last node"
    /// behavior would put it in the wrong place.
    pub fn add_detached_node(&mut self, repr: impl Into<String>, rank: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(GraphNode {
            repr: repr.into(),
            legs: vec![None; rank],
            pred: None,
            succ: None,
        }));
        id
    }

    fn last_node(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, n)| n.as_ref().map(|_| NodeId(i)))
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        self.nodes[id.0].as_ref().expect("use of erased node")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        self.nodes[id.0].as_mut().expect("use of erased node")
    }

    pub fn edge(&self, id: EdgeId) -> &GraphEdge {
        self.edges[id.0].as_ref().expect("use of erased edge")
    }

    /// The first node of the sequence, found by walking `pred` links
    /// back from an arbitrary still-live node.
    pub fn start_node(&self, from: NodeId) -> NodeId {
        let mut cur = from;
        while let Some(p) = self.node(cur).pred {
            cur = p;
        }
        cur
    }

    pub fn succ(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).succ
    }

    /// Any currently-live node, or `None` once every node has been
    /// erased. `graph_codegen::emit_graph` uses this to find a place to
    /// resume walking the sequence after the nodes it started with have
    /// been contracted away and replaced.
    pub fn any_node(&self) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(i, n)| n.as_ref().map(|_| NodeId(i)))
    }

    /// Whether any edge remains anywhere in the graph.
    pub fn has_edges(&self) -> bool {
        self.edges.iter().any(Option::is_some)
    }

    /// Splices `new_node` into the sequence in place of the consecutive
    /// pair `(old_src, old_tgt)`: `new_node`'s predecessor becomes
    /// `old_src`'s predecessor and its successor `old_tgt`'s successor.
    /// Only valid when `old_tgt` is already `old_src`'s immediate
    /// successor, which is how `emit_graph` always selects a pair to
    /// contract.
    pub fn replace_sequence_pair(&mut self, old_src: NodeId, old_tgt: NodeId, new_node: NodeId) {
        let pred = self.node(old_src).pred;
        let succ = self.node(old_tgt).succ;
        if let Some(p) = pred {
            self.node_mut(p).succ = Some(new_node);
        }
        if let Some(s) = succ {
            self.node_mut(s).pred = Some(new_node);
        }
        let n = self.node_mut(new_node);
        n.pred = pred;
        n.succ = succ;
    }

    /// Connects leg `src_leg` of `src` to leg `tgt_leg` of `tgt`. Fails
    /// if either leg is already attached to an edge.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        src_leg: usize,
        tgt: NodeId,
        tgt_leg: usize,
    ) -> Result<EdgeId, InternalError> {
        if self.node(src).leg(src_leg).is_some() {
            return Err(InternalError::DuplicateEdgeAttachment {
                node: format!("{:?}", src),
                leg: src_leg,
            });
        }
        if self.node(tgt).leg(tgt_leg).is_some() {
            return Err(InternalError::DuplicateEdgeAttachment {
                node: format!("{:?}", tgt),
                leg: tgt_leg,
            });
        }
        let id = EdgeId(self.edges.len());
        self.edges.push(Some(GraphEdge {
            src,
            src_leg,
            tgt,
            tgt_leg,
        }));
        self.node_mut(src).legs[src_leg] = Some(id);
        self.node_mut(tgt).legs[tgt_leg] = Some(id);
        Ok(id)
    }

    /// Returns every edge directly between `a` and `b`, in leg order.
    pub fn edges_between(&self, a: NodeId, b: NodeId) -> Vec<EdgeId> {
        self.node(a)
            .legs
            .iter()
            .filter_map(|leg| *leg)
            .filter(|&e| {
                let edge = self.edge(e);
                (edge.src == a && edge.tgt == b) || (edge.src == b && edge.tgt == a)
            })
            .collect()
    }

    /// Clears both legs an edge occupies and removes it from the
    /// arena.
    pub fn erase_edge(&mut self, id: EdgeId) {
        let edge = *self.edge(id);
        self.node_mut(edge.src).legs[edge.src_leg] = None;
        self.node_mut(edge.tgt).legs[edge.tgt_leg] = None;
        self.edges[id.0] = None;
    }

    /// Removes `id` from the arena and the sequence. Fails if any leg
    /// is still attached to an edge — a node must be fully disconnected
    /// before it can be erased.
    pub fn erase_node(&mut self, id: NodeId) -> Result<(), InternalError> {
        if self.node(id).any_leg_set() {
            return Err(InternalError::EraseNodeWithEdges {
                node: format!("{:?}", id),
            });
        }
        let (pred, succ) = {
            let n = self.node(id);
            (n.pred, n.succ)
        };
        if let Some(p) = pred {
            self.node_mut(p).succ = succ;
        }
        if let Some(s) = succ {
            self.node_mut(s).pred = pred;
        }
        self.nodes[id.0] = None;
        Ok(())
    }

    /// Removes `id` from the arena without touching any sequence link
    /// — for the case where `id` was already spliced out of the
    /// sequence by a prior `replace_sequence_pair` call, so re-running
    /// `erase_node`'s relinking would stomp on the links that call
    /// already fixed up. Still requires every leg be clear first.
    pub fn erase_detached_node(&mut self, id: NodeId) -> Result<(), InternalError> {
        if self.node(id).any_leg_set() {
            return Err(InternalError::EraseNodeWithEdges {
                node: format!("{:?}", id),
            });
        }
        self.nodes[id.0] = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_links_nodes_in_insertion_order() {
        let mut g = TensorGraph::new();
        let a = g.add_node("a", 1);
        let b = g.add_node("b", 1);
        let c = g.add_node("c", 1);
        assert_eq!(g.start_node(c), a);
        assert_eq!(g.succ(a), Some(b));
        assert_eq!(g.succ(b), Some(c));
        assert_eq!(g.succ(c), None);
    }

    #[test]
    fn add_edge_rejects_reused_leg() {
        let mut g = TensorGraph::new();
        let a = g.add_node("a", 2);
        let b = g.add_node("b", 1);
        let c = g.add_node("c", 1);
        g.add_edge(a, 0, b, 0).unwrap();
        let err = g.add_edge(a, 0, c, 0).unwrap_err();
        assert!(matches!(err, InternalError::DuplicateEdgeAttachment { .. }));
    }

    #[test]
    fn erase_node_requires_all_legs_clear() {
        let mut g = TensorGraph::new();
        let a = g.add_node("a", 1);
        let b = g.add_node("b", 1);
        let e = g.add_edge(a, 0, b, 0).unwrap();
        assert!(g.erase_node(a).is_err());
        g.erase_edge(e);
        assert!(g.erase_node(a).is_ok());
    }

    #[test]
    fn erase_node_relinks_sequence() {
        let mut g = TensorGraph::new();
        let a = g.add_node("a", 0);
        let b = g.add_node("b", 0);
        let c = g.add_node("c", 0);
        g.erase_node(b).unwrap();
        assert_eq!(g.succ(a), Some(c));
        assert_eq!(g.start_node(c), a);
    }

    #[test]
    fn detached_node_splices_into_sequence_position() {
        let mut g = TensorGraph::new();
        let a = g.add_node("a", 0);
        let b = g.add_node("b", 0);
        let c = g.add_node("c", 0);
        let merged = g.add_detached_node("ab", 0);
        g.replace_sequence_pair(a, b, merged);
        g.erase_detached_node(a).unwrap();
        g.erase_detached_node(b).unwrap();
        assert_eq!(g.start_node(c), merged);
        assert_eq!(g.succ(merged), Some(c));
    }
}
