use std::sync::atomic::{AtomicUsize, Ordering};

use provenant_graph::{NodeId, Parameters};

use crate::shape::ActionShape;

static SEQ: AtomicUsize = AtomicUsize::new(0);

/// A minimal action; `seq` makes every fixture distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub f_id: String,
    pub key: String,
    pub requires: Vec<NodeId>,
    pub creates: Vec<NodeId>,
    pub removes: Vec<NodeId>,
    pub parameter: Parameters,
    pub seq: usize,
}

impl ActionShape for Fixture {
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

pub fn keyed(f_id: &str, key: &str) -> Fixture {
    Fixture {
        f_id: f_id.to_string(),
        key: key.to_string(),
        requires: vec![],
        creates: vec![],
        removes: vec![],
        parameter: Parameters::new(),
        seq: SEQ.fetch_add(1, Ordering::Relaxed),
    }
}

pub fn action(f_id: &str) -> Fixture {
    keyed(f_id, "")
}

pub fn create(object: u64) -> Fixture {
    Fixture {
        creates: vec![NodeId(object)],
        ..action("create")
    }
}

pub fn touch(object: u64) -> Fixture {
    Fixture {
        requires: vec![NodeId(object)],
        ..action("touch")
    }
}

pub fn remove(object: u64) -> Fixture {
    Fixture {
        requires: vec![NodeId(object)],
        removes: vec![NodeId(object)],
        ..action("remove")
    }
}
