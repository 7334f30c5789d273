use super::ids::NodeId;
use super::voxel::Voxel;
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum GraphError {
    #[error("No node found at location {0}")]
    MissingLocation(Voxel),
    #[error("Node {0:?} is not part of the graph")]
    MissingNode(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub location: Voxel,
    edges: Vec<NodeId>,
}

impl Node {
    fn new(location: Voxel) -> Self {
        Self {
            location,
            edges: Vec::new(),
        }
    }

    pub fn edges(&self) -> &[NodeId] {
        &self.edges
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

/// Undirected connectivity between placed Ca positions.
///
/// Nodes live in an arena and are addressed by [`NodeId`]; a side index maps
/// every voxel to the single node occupying it. Edges are stored on both
/// endpoints and every mutating method keeps them symmetric. Iteration follows
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: SlotMap<NodeId, Node>,
    location_index: HashMap<Voxel, NodeId>,
    order: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node at `location`, creating it if the location is new.
    pub fn add_node(&mut self, location: Voxel) -> NodeId {
        if let Some(&id) = self.location_index.get(&location) {
            return id;
        }
        let id = self.nodes.insert(Node::new(location));
        self.location_index.insert(location, id);
        self.order.push(id);
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(id).ok_or(GraphError::MissingNode(id))
    }

    pub fn node_at(&self, location: &Voxel) -> Option<NodeId> {
        self.location_index.get(location).copied()
    }

    pub fn require_node_at(&self, location: &Voxel) -> Result<NodeId, GraphError> {
        self.node_at(location)
            .ok_or(GraphError::MissingLocation(*location))
    }

    pub fn location(&self, id: NodeId) -> Result<Voxel, GraphError> {
        self.node(id).map(|n| n.location)
    }

    pub fn degree(&self, id: NodeId) -> Result<usize, GraphError> {
        self.node(id).map(Node::degree)
    }

    pub fn neighbors(&self, id: NodeId) -> Result<&[NodeId], GraphError> {
        self.node(id).map(Node::edges)
    }

    /// Connects two nodes. Existing edges are not doubled; a node connected to
    /// itself carries one self-referencing edge.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(b) {
            return Err(GraphError::MissingNode(b));
        }
        let node_a = self.nodes.get_mut(a).ok_or(GraphError::MissingNode(a))?;
        if !node_a.edges.contains(&b) {
            node_a.edges.push(b);
        }
        if a != b {
            let node_b = &mut self.nodes[b];
            if !node_b.edges.contains(&a) {
                node_b.edges.push(a);
            }
        }
        Ok(())
    }

    /// Removes the edge between `a` and `b` on both sides.
    ///
    /// Returns `false` if the nodes were not connected.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> Result<bool, GraphError> {
        if !self.nodes.contains_key(b) {
            return Err(GraphError::MissingNode(b));
        }
        let node_a = self.nodes.get_mut(a).ok_or(GraphError::MissingNode(a))?;
        let before = node_a.edges.len();
        node_a.edges.retain(|&e| e != b);
        let removed = node_a.edges.len() != before;
        if a != b {
            self.nodes[b].edges.retain(|&e| e != a);
        }
        Ok(removed)
    }

    /// Removes a node along with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let node = self.nodes.remove(id).ok_or(GraphError::MissingNode(id))?;
        for &neighbor in &node.edges {
            if let Some(other) = self.nodes.get_mut(neighbor) {
                other.edges.retain(|&e| e != id);
            }
        }
        self.location_index.remove(&node.location);
        Ok(node)
    }

    /// Drops every self-referencing edge. Returns how many were removed.
    pub fn remove_self_edges(&mut self) -> usize {
        let mut removed = 0;
        for (id, node) in self.nodes.iter_mut() {
            let before = node.edges.len();
            node.edges.retain(|&e| e != id);
            removed += before - node.edges.len();
        }
        removed
    }

    /// Live node ids in insertion order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.nodes.contains_key(id))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.order
            .iter()
            .filter_map(|&id| self.nodes.get(id).map(|node| (id, node)))
    }

    /// Nodes with three or more edges, in insertion order.
    pub fn branch_nodes(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.degree() >= 3)
            .map(|(id, _)| id)
            .collect()
    }

    /// Every edge exactly once, oriented from the endpoint inserted first.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for (id, node) in self.iter() {
            seen.insert(id);
            for &neighbor in &node.edges {
                if neighbor == id || !seen.contains(&neighbor) {
                    result.push((id, neighbor));
                }
            }
        }
        result
    }

    pub fn edge_count(&self) -> usize {
        self.edges().len()
    }

    /// Checks that every edge is recorded on both of its endpoints.
    pub fn is_symmetric(&self) -> bool {
        self.nodes.iter().all(|(id, node)| {
            node.edges.iter().all(|&neighbor| {
                self.nodes
                    .get(neighbor)
                    .is_some_and(|other| other.edges.contains(&id))
            })
        })
    }

    /// Number of stored edge references, which is twice the edge count for a
    /// graph without self-edges.
    pub fn total_degree(&self) -> usize {
        self.nodes.values().map(Node::degree).sum()
    }
}
