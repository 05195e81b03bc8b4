//! The arena holding every node of one provenance graph.
//!
//! Nodes are stored in an append-only vector indexed by [`NodeId`]. Only
//! slides can be removed; their slot is emptied and the id is never reused.
//! Links between nodes are id lists on the nodes, so there is no shared
//! ownership between nodes and the typed [`Edge`] list is computed on demand.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::{ActionNode, InverseAction, NewAction, Parameters};
use crate::error::GraphError;
use crate::object::{ObjectNode, ObjectRef};
use crate::slide::{NewSlide, SlideNode};
use crate::state::StateNode;

/// Name given to the root state of every graph.
pub const ROOT_STATE_NAME: &str = "Start";

// ──────────────────────────────────────────────
// Ids, kinds and edges
// ──────────────────────────────────────────────

/// Identifier of a node. All four dimensions share one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The dimension a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Action,
    Object,
    State,
    Slide,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Action => "action",
            NodeKind::Object => "object",
            NodeKind::State => "state",
            NodeKind::Slide => "slide",
        };
        f.write_str(s)
    }
}

/// Type of a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    /// action → object consumed as input
    Requires,
    /// action → object produced
    Creates,
    /// action → object destroyed
    Removes,
    /// action → state it leads to
    ResultsIn,
    /// state → action executed from it
    Next,
    /// undo action → action it undoes
    Inverses,
    /// state → object alive in it
    ConsistsOf,
    /// slide → state it shows
    JumpsTo,
    /// slide → following slide
    NextSlide,
}

impl EdgeKind {
    /// Expected kinds of the (from, to) endpoints.
    pub fn endpoints(self) -> (NodeKind, NodeKind) {
        match self {
            EdgeKind::Requires | EdgeKind::Creates | EdgeKind::Removes => {
                (NodeKind::Action, NodeKind::Object)
            }
            EdgeKind::ResultsIn => (NodeKind::Action, NodeKind::State),
            EdgeKind::Next => (NodeKind::State, NodeKind::Action),
            EdgeKind::Inverses => (NodeKind::Action, NodeKind::Action),
            EdgeKind::ConsistsOf => (NodeKind::State, NodeKind::Object),
            EdgeKind::JumpsTo => (NodeKind::Slide, NodeKind::State),
            EdgeKind::NextSlide => (NodeKind::Slide, NodeKind::Slide),
        }
    }
}

/// A typed edge. `index` is the position within an ordered link list
/// (inputs, outputs, outgoing actions, state objects).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub index: Option<u32>,
}

impl Edge {
    fn new(from: NodeId, to: NodeId, kind: EdgeKind) -> Self {
        Edge {
            from,
            to,
            kind,
            index: None,
        }
    }

    fn indexed(from: NodeId, to: NodeId, kind: EdgeKind, index: usize) -> Self {
        Edge {
            from,
            to,
            kind,
            index: Some(index as u32),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Action(ActionNode),
    Object(ObjectNode),
    State(StateNode),
    Slide(SlideNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Action(n) => n.id,
            Node::Object(n) => n.id,
            Node::State(n) => n.id,
            Node::Slide(n) => n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Action(_) => NodeKind::Action,
            Node::Object(_) => NodeKind::Object,
            Node::State(_) => NodeKind::State,
            Node::Slide(_) => NodeKind::Slide,
        }
    }
}

/// Where to place a slide within the slide chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidePosition {
    /// Start a new chain with this slide as its head.
    Head,
    /// Directly after the given slide.
    After(NodeId),
    /// Directly before the given slide.
    Before(NodeId),
}

// ──────────────────────────────────────────────
// Graph
// ──────────────────────────────────────────────

/// All nodes of one provenance graph.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// A graph holding only its root state.
    pub fn new() -> Self {
        let root = NodeId(0);
        Graph {
            nodes: vec![Some(Node::State(StateNode {
                id: root,
                name: ROOT_STATE_NAME.to_string(),
                attrs: Parameters::new(),
                resulting_from: None,
                previous: None,
                next: Vec::new(),
                consists_of: Vec::new(),
                visited: true,
            }))],
            root,
        }
    }

    pub(crate) fn from_parts(nodes: Vec<Option<Node>>, root: NodeId) -> Self {
        Graph { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn allocate(&mut self, build: impl FnOnce(NodeId) -> Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(Some(build(id)));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// All live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    /// Number of live nodes across all dimensions.
    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    /// `true` iff no action has been recorded.
    pub fn is_empty(&self) -> bool {
        self.actions().next().is_none()
    }

    fn kind_error(&self, id: NodeId, expected: NodeKind) -> GraphError {
        if self.contains(id) {
            GraphError::WrongKind { id, expected }
        } else {
            GraphError::UnknownNode { id }
        }
    }

    // ── Typed access ─────────────────────────────────────────────────────────

    pub fn action(&self, id: NodeId) -> Option<&ActionNode> {
        match self.node(id) {
            Some(Node::Action(n)) => Some(n),
            _ => None,
        }
    }

    pub fn object(&self, id: NodeId) -> Option<&ObjectNode> {
        match self.node(id) {
            Some(Node::Object(n)) => Some(n),
            _ => None,
        }
    }

    pub fn state(&self, id: NodeId) -> Option<&StateNode> {
        match self.node(id) {
            Some(Node::State(n)) => Some(n),
            _ => None,
        }
    }

    pub fn slide(&self, id: NodeId) -> Option<&SlideNode> {
        match self.node(id) {
            Some(Node::Slide(n)) => Some(n),
            _ => None,
        }
    }

    pub fn expect_action(&self, id: NodeId) -> Result<&ActionNode, GraphError> {
        self.action(id)
            .ok_or_else(|| self.kind_error(id, NodeKind::Action))
    }

    pub fn expect_object(&self, id: NodeId) -> Result<&ObjectNode, GraphError> {
        self.object(id)
            .ok_or_else(|| self.kind_error(id, NodeKind::Object))
    }

    pub fn expect_state(&self, id: NodeId) -> Result<&StateNode, GraphError> {
        self.state(id)
            .ok_or_else(|| self.kind_error(id, NodeKind::State))
    }

    pub fn expect_slide(&self, id: NodeId) -> Result<&SlideNode, GraphError> {
        self.slide(id)
            .ok_or_else(|| self.kind_error(id, NodeKind::Slide))
    }

    fn action_mut(&mut self, id: NodeId) -> Result<&mut ActionNode, GraphError> {
        let err = self.kind_error(id, NodeKind::Action);
        match self.node_mut(id) {
            Some(Node::Action(n)) => Ok(n),
            _ => Err(err),
        }
    }

    fn object_mut(&mut self, id: NodeId) -> Result<&mut ObjectNode, GraphError> {
        let err = self.kind_error(id, NodeKind::Object);
        match self.node_mut(id) {
            Some(Node::Object(n)) => Ok(n),
            _ => Err(err),
        }
    }

    fn state_mut(&mut self, id: NodeId) -> Result<&mut StateNode, GraphError> {
        let err = self.kind_error(id, NodeKind::State);
        match self.node_mut(id) {
            Some(Node::State(n)) => Ok(n),
            _ => Err(err),
        }
    }

    fn slide_mut(&mut self, id: NodeId) -> Result<&mut SlideNode, GraphError> {
        let err = self.kind_error(id, NodeKind::Slide);
        match self.node_mut(id) {
            Some(Node::Slide(n)) => Ok(n),
            _ => Err(err),
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionNode> {
        self.nodes().filter_map(|n| match n {
            Node::Action(a) => Some(a),
            _ => None,
        })
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectNode> {
        self.nodes().filter_map(|n| match n {
            Node::Object(o) => Some(o),
            _ => None,
        })
    }

    pub fn states(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes().filter_map(|n| match n {
            Node::State(s) => Some(s),
            _ => None,
        })
    }

    pub fn slides(&self) -> impl Iterator<Item = &SlideNode> {
        self.nodes().filter_map(|n| match n {
            Node::Slide(s) => Some(s),
            _ => None,
        })
    }

    // ── Objects ──────────────────────────────────────────────────────────────

    pub fn add_object(&mut self, object: ObjectRef) -> NodeId {
        self.allocate(|id| Node::Object(ObjectNode { id, object }))
    }

    /// The most recently added object node with this hash.
    pub fn find_object_by_hash(&self, hash: &str) -> Option<&ObjectNode> {
        self.objects().filter(|o| o.hash() == hash).last()
    }

    /// Reuse the object node with the same hash, or register a new one.
    pub fn find_or_add_object(&mut self, object: &ObjectRef) -> NodeId {
        match self.find_object_by_hash(object.hash()) {
            Some(existing) => existing.id,
            None => self.add_object(object.clone()),
        }
    }

    /// Replace the runtime handle of an object node, e.g. after replaying the
    /// action that creates it.
    pub fn bind_object(&mut self, id: NodeId, object: ObjectRef) -> Result<(), GraphError> {
        self.object_mut(id)?.object = object;
        Ok(())
    }

    // ── Actions and states ───────────────────────────────────────────────────

    /// Record an action executed from `parent` together with the state it
    /// leads to. Returns `(action_id, state_id)`.
    pub fn add_action(
        &mut self,
        parent: NodeId,
        action: NewAction,
        state_name: impl Into<String>,
    ) -> Result<(NodeId, NodeId), GraphError> {
        let parent_objects = self.expect_state(parent)?.consists_of.clone();
        for id in action
            .requires
            .iter()
            .chain(&action.creates)
            .chain(&action.removes)
        {
            self.expect_object(*id)?;
        }
        if let Some(inverse) = &action.inverse {
            self.check_inverse(inverse)?;
        }
        if let Some(target) = action.inverses {
            self.expect_action(target)?;
        }
        let created = self.objects_created_on_path(parent)?;
        if let Some(dup) = action.creates.iter().find(|c| created.contains(c)) {
            return Err(GraphError::DuplicateCreation {
                object: *dup,
                state: parent,
            });
        }

        let mut consists_of = parent_objects;
        for id in action.requires.iter().chain(&action.creates) {
            if !consists_of.contains(id) {
                consists_of.push(*id);
            }
        }
        consists_of.retain(|id| !action.removes.contains(id));

        let action_id = NodeId(self.nodes.len() as u64);
        let state_id = NodeId(action_id.0 + 1);
        self.allocate(|id| {
            Node::Action(ActionNode {
                id,
                f_id: action.f_id,
                meta: action.meta,
                parameter: action.parameter,
                requires: action.requires,
                creates: action.creates,
                removes: action.removes,
                inverse: action.inverse,
                inverses: action.inverses,
                parent,
                resulted_in: state_id,
                attrs: Parameters::new(),
            })
        });
        let name = state_name.into();
        self.allocate(|id| {
            Node::State(StateNode {
                id,
                name,
                attrs: Parameters::new(),
                resulting_from: Some(action_id),
                previous: Some(parent),
                next: Vec::new(),
                consists_of,
                visited: false,
            })
        });
        self.state_mut(parent)?.next.push(action_id);
        Ok((action_id, state_id))
    }

    fn check_inverse(&self, inverse: &InverseAction) -> Result<(), GraphError> {
        for id in &inverse.inputs {
            self.expect_object(*id)?;
        }
        Ok(())
    }

    /// Refresh the stored inverse of an action.
    pub fn set_inverse(
        &mut self,
        action: NodeId,
        inverse: Option<InverseAction>,
    ) -> Result<(), GraphError> {
        if let Some(inverse) = &inverse {
            self.check_inverse(inverse)?;
        }
        self.action_mut(action)?.inverse = inverse;
        Ok(())
    }

    pub fn set_action_attr(
        &mut self,
        action: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), GraphError> {
        self.action_mut(action)?.attrs.insert(key.into(), value);
        Ok(())
    }

    pub fn set_state_attr(
        &mut self,
        state: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), GraphError> {
        self.state_mut(state)?.attrs.insert(key.into(), value);
        Ok(())
    }

    pub fn mark_visited(&mut self, state: NodeId) -> Result<(), GraphError> {
        self.state_mut(state)?.visited = true;
        Ok(())
    }

    // ── Paths ────────────────────────────────────────────────────────────────

    /// States from the root to `state`, both inclusive.
    pub fn state_path(&self, state: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut path = vec![state];
        let mut cursor = self.expect_state(state)?;
        while let Some(previous) = cursor.previous {
            if path.len() > self.nodes.len() {
                return Err(GraphError::Malformed {
                    message: format!("state {} has a cyclic ancestry", state),
                });
            }
            path.push(previous);
            cursor = self.expect_state(previous)?;
        }
        path.reverse();
        Ok(path)
    }

    /// Actions leading from the root to `state`, in execution order.
    pub fn action_path(&self, state: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut actions = Vec::new();
        for id in self.state_path(state)? {
            if let Some(action) = self.expect_state(id)?.resulting_from {
                actions.push(action);
            }
        }
        Ok(actions)
    }

    /// The deepest state that is an ancestor of (or equal to) both states.
    pub fn lowest_common_ancestor(&self, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        let pa = self.state_path(a)?;
        let pb = self.state_path(b)?;
        pa.iter()
            .zip(&pb)
            .take_while(|(x, y)| x == y)
            .last()
            .map(|(x, _)| *x)
            .ok_or_else(|| GraphError::Malformed {
                message: format!("states {} and {} do not share a root", a, b),
            })
    }

    /// Objects created by any action on the path from the root to `state`.
    pub fn objects_created_on_path(&self, state: NodeId) -> Result<BTreeSet<NodeId>, GraphError> {
        let mut created = BTreeSet::new();
        for id in self.action_path(state)? {
            created.extend(self.expect_action(id)?.creates.iter().copied());
        }
        Ok(created)
    }

    // ── Slides ───────────────────────────────────────────────────────────────

    pub fn add_slide(
        &mut self,
        slide: NewSlide,
        position: SlidePosition,
    ) -> Result<NodeId, GraphError> {
        if let Some(state) = slide.state {
            self.expect_state(state)?;
        }
        if let SlidePosition::After(anchor) | SlidePosition::Before(anchor) = position {
            self.expect_slide(anchor)?;
        }
        let id = self.allocate(|id| {
            Node::Slide(SlideNode {
                id,
                name: slide.name,
                text: slide.text,
                duration_ms: slide.duration_ms,
                transition_ms: slide.transition_ms,
                state: slide.state,
                next: None,
                previous: None,
                attrs: Parameters::new(),
            })
        });
        self.link_slide(id, position)?;
        Ok(id)
    }

    /// Move a slide to a new position, possibly into another chain.
    pub fn move_slide(&mut self, slide: NodeId, position: SlidePosition) -> Result<(), GraphError> {
        self.expect_slide(slide)?;
        if let SlidePosition::After(anchor) | SlidePosition::Before(anchor) = position {
            if anchor == slide {
                return Err(GraphError::InvalidSlidePosition {
                    slide,
                    message: "a slide cannot be positioned relative to itself".to_string(),
                });
            }
            self.expect_slide(anchor)?;
        }
        self.unlink_slide(slide)?;
        self.link_slide(slide, position)
    }

    /// Remove a slide, closing the gap in its chain.
    pub fn remove_slide(&mut self, slide: NodeId) -> Result<SlideNode, GraphError> {
        self.unlink_slide(slide)?;
        match self.nodes[slide.index()].take() {
            Some(Node::Slide(node)) => Ok(node),
            _ => Err(GraphError::UnknownNode { id: slide }),
        }
    }

    pub fn set_slide_state(
        &mut self,
        slide: NodeId,
        state: Option<NodeId>,
    ) -> Result<(), GraphError> {
        if let Some(state) = state {
            self.expect_state(state)?;
        }
        self.slide_mut(slide)?.state = state;
        Ok(())
    }

    pub fn set_slide_timing(
        &mut self,
        slide: NodeId,
        duration_ms: u64,
        transition_ms: u64,
    ) -> Result<(), GraphError> {
        let node = self.slide_mut(slide)?;
        node.duration_ms = duration_ms;
        node.transition_ms = transition_ms;
        Ok(())
    }

    pub fn set_slide_attr(
        &mut self,
        slide: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), GraphError> {
        self.slide_mut(slide)?.attrs.insert(key.into(), value);
        Ok(())
    }

    fn unlink_slide(&mut self, id: NodeId) -> Result<(), GraphError> {
        let (previous, next) = {
            let node = self.expect_slide(id)?;
            (node.previous, node.next)
        };
        if let Some(p) = previous {
            self.slide_mut(p)?.next = next;
        }
        if let Some(n) = next {
            self.slide_mut(n)?.previous = previous;
        }
        let node = self.slide_mut(id)?;
        node.previous = None;
        node.next = None;
        Ok(())
    }

    fn link_slide(&mut self, id: NodeId, position: SlidePosition) -> Result<(), GraphError> {
        match position {
            SlidePosition::Head => {}
            SlidePosition::After(anchor) => {
                let after = self.expect_slide(anchor)?.next;
                {
                    let node = self.slide_mut(id)?;
                    node.previous = Some(anchor);
                    node.next = after;
                }
                if let Some(n) = after {
                    self.slide_mut(n)?.previous = Some(id);
                }
                self.slide_mut(anchor)?.next = Some(id);
            }
            SlidePosition::Before(anchor) => {
                let before = self.expect_slide(anchor)?.previous;
                {
                    let node = self.slide_mut(id)?;
                    node.next = Some(anchor);
                    node.previous = before;
                }
                if let Some(p) = before {
                    self.slide_mut(p)?.next = Some(id);
                }
                self.slide_mut(anchor)?.previous = Some(id);
            }
        }
        Ok(())
    }

    /// Heads of all slide chains, lowest id first.
    pub fn slide_heads(&self) -> Vec<NodeId> {
        self.slides()
            .filter(|s| s.previous.is_none())
            .map(|s| s.id)
            .collect()
    }

    /// The full chain containing `slide`, from its head.
    pub fn slide_sequence(&self, slide: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let limit = self.nodes.len();
        let mut head = self.expect_slide(slide)?;
        let mut steps = 0;
        while let Some(previous) = head.previous {
            steps += 1;
            if steps > limit {
                return Err(cyclic_slides(slide));
            }
            head = self.expect_slide(previous)?;
        }
        let mut chain = vec![head.id];
        let mut cursor = head;
        while let Some(next) = cursor.next {
            if chain.len() > limit {
                return Err(cyclic_slides(slide));
            }
            chain.push(next);
            cursor = self.expect_slide(next)?;
        }
        Ok(chain)
    }

    /// Slides jumping to `state`, lowest id first.
    pub fn slides_for_state(&self, state: NodeId) -> Vec<NodeId> {
        self.slides()
            .filter(|s| s.state == Some(state))
            .map(|s| s.id)
            .collect()
    }

    // ── Edges and derived graphs ─────────────────────────────────────────────

    /// Typed edge list derived from node links, in node id order.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for node in self.nodes() {
            match node {
                Node::Action(a) => {
                    edges.push(Edge::new(a.id, a.resulted_in, EdgeKind::ResultsIn));
                    for (i, o) in a.requires.iter().enumerate() {
                        edges.push(Edge::indexed(a.id, *o, EdgeKind::Requires, i));
                    }
                    for (i, o) in a.creates.iter().enumerate() {
                        edges.push(Edge::indexed(a.id, *o, EdgeKind::Creates, i));
                    }
                    for (i, o) in a.removes.iter().enumerate() {
                        edges.push(Edge::indexed(a.id, *o, EdgeKind::Removes, i));
                    }
                    if let Some(target) = a.inverses {
                        edges.push(Edge::new(a.id, target, EdgeKind::Inverses));
                    }
                }
                Node::State(s) => {
                    for (i, a) in s.next.iter().enumerate() {
                        edges.push(Edge::indexed(s.id, *a, EdgeKind::Next, i));
                    }
                    for (i, o) in s.consists_of.iter().enumerate() {
                        edges.push(Edge::indexed(s.id, *o, EdgeKind::ConsistsOf, i));
                    }
                }
                Node::Slide(s) => {
                    if let Some(state) = s.state {
                        edges.push(Edge::new(s.id, state, EdgeKind::JumpsTo));
                    }
                    if let Some(next) = s.next {
                        edges.push(Edge::new(s.id, next, EdgeKind::NextSlide));
                    }
                }
                Node::Object(_) => {}
            }
        }
        edges
    }

    /// Build a fresh linear graph replaying `actions` in order from a new
    /// root. Object handles and state annotations are carried over; undo links
    /// and slides are not.
    pub fn linearize(&self, actions: &[NodeId]) -> Result<Graph, GraphError> {
        let mut out = Graph::new();
        let mut objects: HashMap<NodeId, NodeId> = HashMap::new();
        let mut current = out.root();
        for &id in actions {
            let action = self.expect_action(id)?;
            let state = self.expect_state(action.resulted_in)?;
            let requires = self.carry_objects(&mut out, &mut objects, &action.requires)?;
            let creates = self.carry_objects(&mut out, &mut objects, &action.creates)?;
            let removes = self.carry_objects(&mut out, &mut objects, &action.removes)?;
            let inverse = match &action.inverse {
                Some(inv) => Some(InverseAction {
                    inputs: self.carry_objects(&mut out, &mut objects, &inv.inputs)?,
                    ..inv.clone()
                }),
                None => None,
            };
            let (new_action, new_state) = out.add_action(
                current,
                NewAction {
                    f_id: action.f_id.clone(),
                    meta: action.meta.clone(),
                    parameter: action.parameter.clone(),
                    requires,
                    creates,
                    removes,
                    inverse,
                    inverses: None,
                },
                state.name.clone(),
            )?;
            out.action_mut(new_action)?.attrs = action.attrs.clone();
            let target = out.state_mut(new_state)?;
            target.attrs = state.attrs.clone();
            target.visited = state.visited;
            current = new_state;
        }
        Ok(out)
    }

    fn carry_objects(
        &self,
        out: &mut Graph,
        mapping: &mut HashMap<NodeId, NodeId>,
        ids: &[NodeId],
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut carried = Vec::with_capacity(ids.len());
        for id in ids {
            let mapped = match mapping.get(id) {
                Some(m) => *m,
                None => {
                    let object = self.expect_object(*id)?.object.clone();
                    let m = out.add_object(object);
                    mapping.insert(*id, m);
                    m
                }
            };
            carried.push(mapped);
        }
        Ok(carried)
    }
}

fn cyclic_slides(slide: NodeId) -> GraphError {
    GraphError::Malformed {
        message: format!("slide chain containing {} is cyclic", slide),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionCategory, ActionMetaData, ActionOperation};
    use crate::object::ObjectCategory;

    fn new_action(f_id: &str) -> NewAction {
        NewAction {
            f_id: f_id.to_string(),
            meta: ActionMetaData::at(f_id, ActionCategory::Data, ActionOperation::Update, 0),
            parameter: Parameters::new(),
            requires: vec![],
            creates: vec![],
            removes: vec![],
            inverse: None,
            inverses: None,
        }
    }

    fn view(hash: &str) -> ObjectRef {
        ObjectRef::detached(hash, ObjectCategory::Visual, hash)
    }

    #[test]
    fn new_graph_has_only_root() {
        let g = Graph::new();
        assert!(g.is_empty());
        assert_eq!(g.len(), 1);
        let root = g.state(g.root()).unwrap();
        assert!(root.is_root());
        assert_eq!(root.name, ROOT_STATE_NAME);
    }

    #[test]
    fn add_action_links_parent_and_result() {
        let mut g = Graph::new();
        let root = g.root();
        let (a, s) = g.add_action(root, new_action("f"), "one").unwrap();
        assert!(!g.is_empty());
        assert_eq!(g.state(root).unwrap().next, vec![a]);
        let action = g.action(a).unwrap();
        assert_eq!(action.parent, root);
        assert_eq!(action.resulted_in, s);
        let state = g.state(s).unwrap();
        assert_eq!(state.previous, Some(root));
        assert_eq!(state.resulting_from, Some(a));
    }

    #[test]
    fn consists_of_tracks_created_and_removed() {
        let mut g = Graph::new();
        let x = g.add_object(view("x"));
        let y = g.add_object(view("y"));
        let mut create = new_action("create");
        create.creates = vec![x, y];
        let (_, s1) = g.add_action(g.root(), create, "created").unwrap();
        let mut remove = new_action("remove");
        remove.removes = vec![x];
        let (_, s2) = g.add_action(s1, remove, "removed").unwrap();
        assert_eq!(g.state(s1).unwrap().consists_of, vec![x, y]);
        assert_eq!(g.state(s2).unwrap().consists_of, vec![y]);
    }

    #[test]
    fn double_creation_on_path_is_rejected() {
        let mut g = Graph::new();
        let x = g.add_object(view("x"));
        let mut create = new_action("create");
        create.creates = vec![x];
        let (_, s1) = g.add_action(g.root(), create.clone(), "a").unwrap();
        let err = g.add_action(s1, create.clone(), "b").unwrap_err();
        assert_eq!(err, GraphError::DuplicateCreation { object: x, state: s1 });
        // a sibling branch may create it again
        assert!(g.add_action(g.root(), create, "c").is_ok());
    }

    #[test]
    fn unknown_object_is_rejected() {
        let mut g = Graph::new();
        let mut action = new_action("f");
        action.requires = vec![NodeId(99)];
        assert_eq!(
            g.add_action(g.root(), action, "x").unwrap_err(),
            GraphError::UnknownNode { id: NodeId(99) }
        );
        assert!(g.is_empty());
    }

    #[test]
    fn wrong_kind_parent_is_rejected() {
        let mut g = Graph::new();
        let x = g.add_object(view("x"));
        assert_eq!(
            g.add_action(x, new_action("f"), "x").unwrap_err(),
            GraphError::WrongKind {
                id: x,
                expected: NodeKind::State
            }
        );
    }

    #[test]
    fn paths_and_common_ancestor() {
        let mut g = Graph::new();
        let root = g.root();
        let (a1, s1) = g.add_action(root, new_action("a"), "s1").unwrap();
        let (a2, s2) = g.add_action(s1, new_action("b"), "s2").unwrap();
        let (_, s3) = g.add_action(s1, new_action("c"), "s3").unwrap();
        assert_eq!(g.state_path(s2).unwrap(), vec![root, s1, s2]);
        assert_eq!(g.action_path(s2).unwrap(), vec![a1, a2]);
        assert_eq!(g.lowest_common_ancestor(s2, s3).unwrap(), s1);
        assert_eq!(g.lowest_common_ancestor(s2, s1).unwrap(), s1);
        assert_eq!(g.lowest_common_ancestor(root, s3).unwrap(), root);
    }

    #[test]
    fn find_or_add_object_reuses_hash() {
        let mut g = Graph::new();
        let a = g.find_or_add_object(&view("x"));
        let b = g.find_or_add_object(&view("x"));
        let c = g.find_or_add_object(&view("y"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn slide_chain_insert_move_remove() {
        let mut g = Graph::new();
        let root = g.root();
        let s1 = g
            .add_slide(NewSlide::for_state("one", root), SlidePosition::Head)
            .unwrap();
        let s2 = g
            .add_slide(NewSlide::text("two", "caption"), SlidePosition::After(s1))
            .unwrap();
        let s3 = g
            .add_slide(NewSlide::for_state("three", root), SlidePosition::Before(s2))
            .unwrap();
        assert_eq!(g.slide_sequence(s2).unwrap(), vec![s1, s3, s2]);
        assert_eq!(g.slide_heads(), vec![s1]);

        g.move_slide(s1, SlidePosition::After(s2)).unwrap();
        assert_eq!(g.slide_sequence(s1).unwrap(), vec![s3, s2, s1]);

        g.move_slide(s2, SlidePosition::Head).unwrap();
        assert_eq!(g.slide_heads(), vec![s2, s3]);
        assert_eq!(g.slide_sequence(s3).unwrap(), vec![s3, s1]);

        let removed = g.remove_slide(s3).unwrap();
        assert_eq!(removed.name, "three");
        assert!(g.slide(s3).is_none());
        assert_eq!(g.slide_sequence(s1).unwrap(), vec![s1]);
        assert_eq!(g.slides_for_state(root), vec![s1]);
    }

    #[test]
    fn slide_cannot_anchor_on_itself() {
        let mut g = Graph::new();
        let s = g
            .add_slide(NewSlide::text("t", "x"), SlidePosition::Head)
            .unwrap();
        assert!(matches!(
            g.move_slide(s, SlidePosition::After(s)),
            Err(GraphError::InvalidSlidePosition { .. })
        ));
    }

    #[test]
    fn edges_cover_all_links() {
        let mut g = Graph::new();
        let x = g.add_object(view("x"));
        let mut create = new_action("create");
        create.creates = vec![x];
        let (a, s) = g.add_action(g.root(), create, "s").unwrap();
        g.add_slide(NewSlide::for_state("slide", s), SlidePosition::Head)
            .unwrap();
        let kinds: Vec<EdgeKind> = g.edges().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EdgeKind::Next));
        assert!(kinds.contains(&EdgeKind::ResultsIn));
        assert!(kinds.contains(&EdgeKind::Creates));
        assert!(kinds.contains(&EdgeKind::ConsistsOf));
        assert!(kinds.contains(&EdgeKind::JumpsTo));
        assert!(g
            .edges()
            .iter()
            .any(|e| e.kind == EdgeKind::ResultsIn && e.from == a && e.to == s));
    }

    #[test]
    fn linearize_replays_selected_actions() {
        let mut g = Graph::new();
        let x = g.add_object(view("x"));
        let mut create = new_action("create");
        create.creates = vec![x];
        let (a1, s1) = g.add_action(g.root(), create, "created").unwrap();
        g.set_state_attr(s1, "thumbnail", serde_json::json!("t.png"))
            .unwrap();
        let (_, s2) = g.add_action(s1, new_action("noise"), "noise").unwrap();
        let mut touch = new_action("touch");
        touch.requires = vec![x];
        let (a3, _) = g.add_action(s2, touch, "touched").unwrap();

        let lin = g.linearize(&[a1, a3]).unwrap();
        let names: Vec<&str> = lin.actions().map(|a| a.f_id.as_str()).collect();
        assert_eq!(names, vec!["create", "touch"]);
        assert_eq!(lin.objects().count(), 1);
        let first_state = lin.states().find(|s| s.name == "created").unwrap();
        assert_eq!(first_state.attrs["thumbnail"], serde_json::json!("t.png"));
    }
}
