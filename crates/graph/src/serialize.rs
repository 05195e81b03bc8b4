//! Persisted wire format of a provenance graph.
//!
//! ```json
//! { "desc": { "id": "...", "name": "...", "creator": "...", "ts": "...", "attrs": {} },
//!   "nodes": [ { "type": "action", "id": 1, "f_id": "setParam", ... } ],
//!   "edges": [ { "from": 0, "to": 1, "type": "next", "index": 0 } ] }
//! ```
//!
//! The node and edge lists are order-independent: ordered link lists carry
//! their position in `index`. Object nodes are persisted without values and
//! come back as detached handles.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::action::{ActionMetaData, ActionNode, InverseAction, Parameters};
use crate::clock;
use crate::error::GraphError;
use crate::graph::{EdgeKind, Graph, Node, NodeId, NodeKind};
use crate::object::{ObjectCategory, ObjectNode, ObjectRef};
use crate::slide::SlideNode;
use crate::state::StateNode;

/// Storable descriptor of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDesc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub creator: String,
    /// Creation time, RFC 3339.
    pub ts: String,
    /// Last modification time, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default)]
    pub attrs: Parameters,
}

impl GraphDesc {
    pub fn new(id: impl Into<String>, name: impl Into<String>, creator: impl Into<String>) -> Self {
        GraphDesc {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            creator: creator.into(),
            ts: clock::now_rfc3339(),
            modified: None,
            attrs: Parameters::new(),
        }
    }

    pub fn touch(&mut self) {
        self.modified = Some(clock::now_rfc3339());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SerializedNode {
    Action {
        id: NodeId,
        f_id: String,
        meta: ActionMetaData,
        #[serde(default)]
        parameter: Parameters,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inverse: Option<InverseAction>,
        #[serde(default)]
        attrs: Parameters,
    },
    Object {
        id: NodeId,
        name: String,
        category: ObjectCategory,
        hash: String,
    },
    State {
        id: NodeId,
        name: String,
        #[serde(default)]
        attrs: Parameters,
        #[serde(default)]
        visited: bool,
    },
    Slide {
        id: NodeId,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        duration_ms: u64,
        #[serde(default)]
        transition_ms: u64,
        #[serde(default)]
        attrs: Parameters,
    },
}

impl SerializedNode {
    pub fn id(&self) -> NodeId {
        match self {
            SerializedNode::Action { id, .. }
            | SerializedNode::Object { id, .. }
            | SerializedNode::State { id, .. }
            | SerializedNode::Slide { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            SerializedNode::Action { .. } => NodeKind::Action,
            SerializedNode::Object { .. } => NodeKind::Object,
            SerializedNode::State { .. } => NodeKind::State,
            SerializedNode::Slide { .. } => NodeKind::Slide,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// A persisted graph: descriptor plus flat node and edge lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    pub desc: GraphDesc,
    pub nodes: Vec<SerializedNode>,
    pub edges: Vec<SerializedEdge>,
}

impl SerializedGraph {
    /// All distinct command ids referenced by actions and stored inverses.
    pub fn function_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if let SerializedNode::Action { f_id, inverse, .. } = node {
                for id in std::iter::once(f_id.as_str()).chain(inverse.as_ref().map(|i| i.f_id.as_str())) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind() == kind).count()
    }
}

// ──────────────────────────────────────────────
// Graph → wire format
// ──────────────────────────────────────────────

impl Graph {
    pub fn to_serialized(&self, desc: GraphDesc) -> SerializedGraph {
        let nodes = self
            .nodes()
            .map(|node| match node {
                Node::Action(a) => SerializedNode::Action {
                    id: a.id,
                    f_id: a.f_id.clone(),
                    meta: a.meta.clone(),
                    parameter: a.parameter.clone(),
                    inverse: a.inverse.clone(),
                    attrs: a.attrs.clone(),
                },
                Node::Object(o) => SerializedNode::Object {
                    id: o.id,
                    name: o.name().to_string(),
                    category: o.category(),
                    hash: o.hash().to_string(),
                },
                Node::State(s) => SerializedNode::State {
                    id: s.id,
                    name: s.name.clone(),
                    attrs: s.attrs.clone(),
                    visited: s.visited,
                },
                Node::Slide(s) => SerializedNode::Slide {
                    id: s.id,
                    name: s.name.clone(),
                    text: s.text.clone(),
                    duration_ms: s.duration_ms,
                    transition_ms: s.transition_ms,
                    attrs: s.attrs.clone(),
                },
            })
            .collect();
        let edges = self
            .edges()
            .into_iter()
            .map(|e| SerializedEdge {
                from: e.from,
                to: e.to,
                kind: e.kind,
                index: e.index,
            })
            .collect();
        SerializedGraph { desc, nodes, edges }
    }

    /// Rebuild a graph from its wire format, validating the topology.
    pub fn from_serialized(serialized: &SerializedGraph) -> Result<Graph, GraphError> {
        Rebuild::new(serialized)?.finish()
    }
}

// ──────────────────────────────────────────────
// Wire format → Graph
// ──────────────────────────────────────────────

fn malformed(message: String) -> GraphError {
    GraphError::Malformed { message }
}

#[derive(Default)]
struct Links {
    requires: HashMap<NodeId, Vec<(u32, NodeId)>>,
    creates: HashMap<NodeId, Vec<(u32, NodeId)>>,
    removes: HashMap<NodeId, Vec<(u32, NodeId)>>,
    next: HashMap<NodeId, Vec<(u32, NodeId)>>,
    consists_of: HashMap<NodeId, Vec<(u32, NodeId)>>,
    results_in: HashMap<NodeId, NodeId>,
    resulting_from: HashMap<NodeId, NodeId>,
    parent: HashMap<NodeId, NodeId>,
    inverses: HashMap<NodeId, NodeId>,
    jumps_to: HashMap<NodeId, NodeId>,
    next_slide: HashMap<NodeId, NodeId>,
    previous_slide: HashMap<NodeId, NodeId>,
}

fn ordered(map: &mut HashMap<NodeId, Vec<(u32, NodeId)>>, id: NodeId) -> Vec<NodeId> {
    let mut entries = map.remove(&id).unwrap_or_default();
    entries.sort_by_key(|(index, _)| *index);
    entries.into_iter().map(|(_, id)| id).collect()
}

fn insert_unique(
    map: &mut HashMap<NodeId, NodeId>,
    key: NodeId,
    value: NodeId,
    what: &str,
) -> Result<(), GraphError> {
    if map.insert(key, value).is_some() {
        return Err(malformed(format!("node {} has more than one {}", key, what)));
    }
    Ok(())
}

struct Rebuild<'a> {
    serialized: &'a SerializedGraph,
    kinds: BTreeMap<NodeId, NodeKind>,
    links: Links,
    arena_len: usize,
}

impl<'a> Rebuild<'a> {
    fn new(serialized: &'a SerializedGraph) -> Result<Self, GraphError> {
        let mut kinds = BTreeMap::new();
        for node in &serialized.nodes {
            if kinds.insert(node.id(), node.kind()).is_some() {
                return Err(malformed(format!("duplicate node id {}", node.id())));
            }
        }
        let arena_len = match kinds.keys().next_back() {
            Some(max) => max
                .0
                .checked_add(1)
                .and_then(|len| usize::try_from(len).ok())
                .ok_or_else(|| malformed(format!("node id {} is out of range", max)))?,
            None => 0,
        };

        let mut links = Links::default();
        for edge in &serialized.edges {
            let (from_kind, to_kind) = edge.kind.endpoints();
            for (id, kind) in [(edge.from, from_kind), (edge.to, to_kind)] {
                match kinds.get(&id) {
                    Some(k) if *k == kind => {}
                    Some(_) => {
                        return Err(malformed(format!(
                            "{:?} edge {} -> {} expects a {} node at {}",
                            edge.kind, edge.from, edge.to, kind, id
                        )))
                    }
                    None => {
                        return Err(malformed(format!(
                            "{:?} edge references unknown node {}",
                            edge.kind, id
                        )))
                    }
                }
            }
            let index = edge.index.unwrap_or(0);
            match edge.kind {
                EdgeKind::Requires => links.requires.entry(edge.from).or_default().push((index, edge.to)),
                EdgeKind::Creates => links.creates.entry(edge.from).or_default().push((index, edge.to)),
                EdgeKind::Removes => links.removes.entry(edge.from).or_default().push((index, edge.to)),
                EdgeKind::Next => {
                    links.next.entry(edge.from).or_default().push((index, edge.to));
                    insert_unique(&mut links.parent, edge.to, edge.from, "parent state")?;
                }
                EdgeKind::ConsistsOf => links
                    .consists_of
                    .entry(edge.from)
                    .or_default()
                    .push((index, edge.to)),
                EdgeKind::ResultsIn => {
                    insert_unique(&mut links.results_in, edge.from, edge.to, "result state")?;
                    insert_unique(&mut links.resulting_from, edge.to, edge.from, "producing action")?;
                }
                EdgeKind::Inverses => {
                    insert_unique(&mut links.inverses, edge.from, edge.to, "inverse link")?
                }
                EdgeKind::JumpsTo => {
                    insert_unique(&mut links.jumps_to, edge.from, edge.to, "jump target")?
                }
                EdgeKind::NextSlide => {
                    insert_unique(&mut links.next_slide, edge.from, edge.to, "next slide")?;
                    insert_unique(&mut links.previous_slide, edge.to, edge.from, "previous slide")?;
                }
            }
        }
        Ok(Rebuild {
            serialized,
            kinds,
            links,
            arena_len,
        })
    }

    fn finish(mut self) -> Result<Graph, GraphError> {
        let mut nodes: Vec<Option<Node>> = vec![None; self.arena_len];
        let mut roots = Vec::new();

        for node in &self.serialized.nodes {
            let built = match node {
                SerializedNode::Action {
                    id,
                    f_id,
                    meta,
                    parameter,
                    inverse,
                    attrs,
                } => {
                    let parent = *self
                        .links
                        .parent
                        .get(id)
                        .ok_or_else(|| malformed(format!("action {} has no parent state", id)))?;
                    let resulted_in = *self
                        .links
                        .results_in
                        .get(id)
                        .ok_or_else(|| malformed(format!("action {} leads to no state", id)))?;
                    if let Some(inverse) = inverse {
                        if let Some(bad) = inverse
                            .inputs
                            .iter()
                            .find(|i| self.kinds.get(*i) != Some(&NodeKind::Object))
                        {
                            return Err(malformed(format!(
                                "inverse of action {} references non-object {}",
                                id, bad
                            )));
                        }
                    }
                    Node::Action(ActionNode {
                        id: *id,
                        f_id: f_id.clone(),
                        meta: meta.clone(),
                        parameter: parameter.clone(),
                        requires: ordered(&mut self.links.requires, *id),
                        creates: ordered(&mut self.links.creates, *id),
                        removes: ordered(&mut self.links.removes, *id),
                        inverse: inverse.clone(),
                        inverses: self.links.inverses.get(id).copied(),
                        parent,
                        resulted_in,
                        attrs: attrs.clone(),
                    })
                }
                SerializedNode::Object {
                    id,
                    name,
                    category,
                    hash,
                } => Node::Object(ObjectNode {
                    id: *id,
                    object: ObjectRef::detached(name.clone(), *category, hash.clone()),
                }),
                SerializedNode::State {
                    id,
                    name,
                    attrs,
                    visited,
                } => {
                    let resulting_from = self.links.resulting_from.get(id).copied();
                    let previous = match resulting_from {
                        Some(action) => Some(*self.links.parent.get(&action).ok_or_else(|| {
                            malformed(format!("action {} has no parent state", action))
                        })?),
                        None => {
                            roots.push(*id);
                            None
                        }
                    };
                    Node::State(StateNode {
                        id: *id,
                        name: name.clone(),
                        attrs: attrs.clone(),
                        resulting_from,
                        previous,
                        next: ordered(&mut self.links.next, *id),
                        consists_of: ordered(&mut self.links.consists_of, *id),
                        visited: *visited,
                    })
                }
                SerializedNode::Slide {
                    id,
                    name,
                    text,
                    duration_ms,
                    transition_ms,
                    attrs,
                } => Node::Slide(SlideNode {
                    id: *id,
                    name: name.clone(),
                    text: text.clone(),
                    duration_ms: *duration_ms,
                    transition_ms: *transition_ms,
                    state: self.links.jumps_to.get(id).copied(),
                    next: self.links.next_slide.get(id).copied(),
                    previous: self.links.previous_slide.get(id).copied(),
                    attrs: attrs.clone(),
                }),
            };
            nodes[node.id().0 as usize] = Some(built);
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] => return Err(malformed("graph has no root state".to_string())),
            _ => {
                return Err(malformed(format!(
                    "graph has {} root states, expected exactly one",
                    roots.len()
                )))
            }
        };
        let graph = Graph::from_parts(nodes, root);

        for state in graph.states() {
            graph.state_path(state.id)?;
        }
        let mut reached = HashSet::new();
        for head in graph.slide_heads() {
            reached.extend(graph.slide_sequence(head)?);
        }
        if reached.len() != graph.slides().count() {
            return Err(malformed("slide chains contain a cycle".to_string()));
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionCategory, ActionOperation, NewAction};
    use crate::graph::SlidePosition;
    use crate::slide::NewSlide;

    fn sample() -> Graph {
        let mut g = Graph::new();
        let a = g.add_object(ObjectRef::detached("a", ObjectCategory::Data, "a"));
        let b = g.add_object(ObjectRef::detached("b", ObjectCategory::Visual, "b"));
        let (action, s1) = g
            .add_action(
                g.root(),
                NewAction {
                    f_id: "combine".to_string(),
                    meta: ActionMetaData::at("Combine", ActionCategory::Data, ActionOperation::Create, 5),
                    parameter: serde_json::json!({"k": 1}).as_object().cloned().unwrap_or_default(),
                    requires: vec![b, a],
                    creates: vec![],
                    removes: vec![],
                    inverse: Some(InverseAction {
                        f_id: "split".to_string(),
                        meta: ActionMetaData::at("Split", ActionCategory::Data, ActionOperation::Remove, 5),
                        parameter: Parameters::new(),
                        inputs: vec![a],
                    }),
                    inverses: None,
                },
                "combined",
            )
            .unwrap();
        g.set_action_attr(action, "note", serde_json::json!("x")).unwrap();
        g.set_state_attr(s1, "thumbnail", serde_json::json!("s1.png")).unwrap();
        let first = g
            .add_slide(NewSlide::for_state("first", s1), SlidePosition::Head)
            .unwrap();
        g.add_slide(NewSlide::text("end", "fin"), SlidePosition::After(first))
            .unwrap();
        g
    }

    #[test]
    fn roundtrip_preserves_topology() {
        let g = sample();
        let s = g.to_serialized(GraphDesc::new("g1", "Sample", "tester"));
        let back = Graph::from_serialized(&s).unwrap();
        assert_eq!(back.len(), g.len());
        assert_eq!(back.edges(), g.edges());
        for (x, y) in g.actions().zip(back.actions()) {
            assert_eq!(x, y);
        }
        for (x, y) in g.states().zip(back.states()) {
            assert_eq!(x, y);
        }
        for (x, y) in g.slides().zip(back.slides()) {
            assert_eq!(x, y);
        }
        assert!(back.objects().all(|o| o.object.is_detached()));
    }

    #[test]
    fn roundtrip_is_order_independent() {
        let g = sample();
        let mut s = g.to_serialized(GraphDesc::new("g1", "Sample", "tester"));
        s.nodes.reverse();
        s.edges.reverse();
        let back = Graph::from_serialized(&s).unwrap();
        let requires = &back.actions().next().unwrap().requires;
        assert_eq!(requires, &g.actions().next().unwrap().requires);
    }

    #[test]
    fn json_shape_uses_wire_names() {
        let g = sample();
        let s = g.to_serialized(GraphDesc::new("g1", "Sample", "tester"));
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["desc"]["id"], "g1");
        let action = json["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["type"] == "action")
            .unwrap();
        assert_eq!(action["f_id"], "combine");
        assert!(json["edges"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["type"] == "resultsIn"));
        let parsed: SerializedGraph = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn function_ids_include_inverses() {
        let s = sample().to_serialized(GraphDesc::new("g", "g", "t"));
        assert_eq!(s.function_ids(), vec!["combine", "split"]);
        assert_eq!(s.count(NodeKind::Action), 1);
        assert_eq!(s.count(NodeKind::Slide), 2);
    }

    #[test]
    fn dangling_edge_is_malformed() {
        let mut s = sample().to_serialized(GraphDesc::new("g", "g", "t"));
        s.edges.push(SerializedEdge {
            from: NodeId(0),
            to: NodeId(500),
            kind: EdgeKind::ConsistsOf,
            index: Some(9),
        });
        assert!(matches!(
            Graph::from_serialized(&s),
            Err(GraphError::Malformed { .. })
        ));
    }

    #[test]
    fn two_roots_are_malformed() {
        let mut s = sample().to_serialized(GraphDesc::new("g", "g", "t"));
        s.nodes.push(SerializedNode::State {
            id: NodeId(40),
            name: "orphan".to_string(),
            attrs: Parameters::new(),
            visited: false,
        });
        let err = Graph::from_serialized(&s).unwrap_err();
        assert!(err.to_string().contains("root states"), "{err}");
    }

    #[test]
    fn cyclic_slides_are_malformed() {
        let mut s = sample().to_serialized(GraphDesc::new("g", "g", "t"));
        let slides: Vec<NodeId> = s
            .nodes
            .iter()
            .filter(|n| n.kind() == NodeKind::Slide)
            .map(|n| n.id())
            .collect();
        s.edges.push(SerializedEdge {
            from: slides[1],
            to: slides[0],
            kind: EdgeKind::NextSlide,
            index: None,
        });
        assert!(matches!(
            Graph::from_serialized(&s),
            Err(GraphError::Malformed { .. })
        ));
    }

    #[test]
    fn slide_churn_does_not_break_reload() {
        let mut g = sample();
        for i in 0..1100 {
            let slide = g
                .add_slide(NewSlide::text(format!("tmp{}", i), "scratch"), SlidePosition::Head)
                .unwrap();
            g.remove_slide(slide).unwrap();
        }
        let (action, state) = g
            .add_action(
                g.root(),
                NewAction {
                    f_id: "touch".to_string(),
                    meta: ActionMetaData::at("Touch", ActionCategory::Data, ActionOperation::Update, 9),
                    parameter: Parameters::new(),
                    requires: vec![],
                    creates: vec![],
                    removes: vec![],
                    inverse: None,
                    inverses: None,
                },
                "touched",
            )
            .unwrap();
        assert!(state.0 > 1100);

        let s = g.to_serialized(GraphDesc::new("g", "g", "t"));
        let back = Graph::from_serialized(&s).unwrap();
        assert_eq!(back.len(), g.len());
        assert_eq!(back.action(action).unwrap().f_id, "touch");
    }

    #[test]
    fn id_past_address_space_is_malformed() {
        let mut s = sample().to_serialized(GraphDesc::new("g", "g", "t"));
        s.nodes.push(SerializedNode::Slide {
            id: NodeId(u64::MAX),
            name: "far".to_string(),
            text: None,
            duration_ms: 0,
            transition_ms: 0,
            attrs: Parameters::new(),
        });
        let err = Graph::from_serialized(&s).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }
}
