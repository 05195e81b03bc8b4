use crate::action::Parameters;
use crate::graph::NodeId;

/// A checkpoint reachable from the root by one unique path of actions.
#[derive(Debug, Clone, PartialEq)]
pub struct StateNode {
    pub id: NodeId,
    pub name: String,
    /// Free-form annotations, e.g. a cached thumbnail URL.
    pub attrs: Parameters,
    /// The action that produced this state; `None` only for the root.
    pub resulting_from: Option<NodeId>,
    /// The parent state; `None` only for the root.
    pub previous: Option<NodeId>,
    /// Actions executed from this state, in execution order.
    pub next: Vec<NodeId>,
    /// Objects alive in this state.
    pub consists_of: Vec<NodeId>,
    pub visited: bool,
}

impl StateNode {
    pub fn is_root(&self) -> bool {
        self.resulting_from.is_none()
    }
}
