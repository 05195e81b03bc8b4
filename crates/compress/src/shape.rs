use provenant_graph::{ActionNode, NodeId, Parameters};

/// The parts of an action the compression algorithms look at.
pub trait ActionShape {
    fn f_id(&self) -> &str;
    fn requires(&self) -> &[NodeId];
    fn creates(&self) -> &[NodeId];
    fn removes(&self) -> &[NodeId];
    fn parameter(&self) -> &Parameters;
}

impl ActionShape for ActionNode {
    fn f_id(&self) -> &str {
        &self.f_id
    }

    fn requires(&self) -> &[NodeId] {
        &self.requires
    }

    fn creates(&self) -> &[NodeId] {
        &self.creates
    }

    fn removes(&self) -> &[NodeId] {
        &self.removes
    }

    fn parameter(&self) -> &Parameters {
        &self.parameter
    }
}

impl<T: ActionShape + ?Sized> ActionShape for &T {
    fn f_id(&self) -> &str {
        (**self).f_id()
    }

    fn requires(&self) -> &[NodeId] {
        (**self).requires()
    }

    fn creates(&self) -> &[NodeId] {
        (**self).creates()
    }

    fn removes(&self) -> &[NodeId] {
        (**self).removes()
    }

    fn parameter(&self) -> &Parameters {
        (**self).parameter()
    }
}
