use crate::action::Parameters;
use crate::graph::NodeId;

/// Default playback duration of a slide.
pub const DEFAULT_SLIDE_DURATION_MS: u64 = 1500;

/// One step of a story: a state to jump to, or a text-only slide.
///
/// Slides form doubly linked chains; the head of a chain has no `previous`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideNode {
    pub id: NodeId,
    pub name: String,
    /// Caption for text slides.
    pub text: Option<String>,
    pub duration_ms: u64,
    pub transition_ms: u64,
    /// The state this slide jumps to; `None` for text slides.
    pub state: Option<NodeId>,
    pub next: Option<NodeId>,
    pub previous: Option<NodeId>,
    pub attrs: Parameters,
}

impl SlideNode {
    pub fn is_text_slide(&self) -> bool {
        self.state.is_none()
    }
}

/// Input to [`Graph::add_slide`](crate::Graph::add_slide).
#[derive(Debug, Clone)]
pub struct NewSlide {
    pub name: String,
    pub text: Option<String>,
    pub duration_ms: u64,
    pub transition_ms: u64,
    pub state: Option<NodeId>,
}

impl NewSlide {
    pub fn for_state(name: impl Into<String>, state: NodeId) -> Self {
        NewSlide {
            name: name.into(),
            text: None,
            duration_ms: DEFAULT_SLIDE_DURATION_MS,
            transition_ms: 0,
            state: Some(state),
        }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        NewSlide {
            name: name.into(),
            text: Some(text.into()),
            duration_ms: DEFAULT_SLIDE_DURATION_MS,
            transition_ms: 0,
            state: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_transition(mut self, transition_ms: u64) -> Self {
        self.transition_ms = transition_ms;
        self
    }
}
