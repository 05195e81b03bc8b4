//! Slides (story chains over states) and slide selection.

use provenant_graph::{NewSlide, NodeId, SlideNode, SlidePosition};

use super::ProvenanceGraph;
use crate::error::ProvenanceError;
use crate::events::GraphEvent;

impl ProvenanceGraph {
    /// Start a new story whose first slide jumps to the current state.
    pub fn start_new_slide(&self, name: impl Into<String>) -> Result<NodeId, ProvenanceError> {
        let state = self.current_state();
        self.add_slide(NewSlide::for_state(name, state), SlidePosition::Head)
    }

    /// Add a text-only slide, which has no jump target.
    pub fn make_text_slide(
        &self,
        name: impl Into<String>,
        text: impl Into<String>,
        position: SlidePosition,
    ) -> Result<NodeId, ProvenanceError> {
        self.add_slide(NewSlide::text(name, text), position)
    }

    /// Append a slide after `after`, jumping to `state` or, if `None`, to the
    /// current state.
    pub fn append_slide(
        &self,
        after: NodeId,
        name: impl Into<String>,
        state: Option<NodeId>,
    ) -> Result<NodeId, ProvenanceError> {
        let state = state.unwrap_or_else(|| self.current_state());
        self.add_slide(NewSlide::for_state(name, state), SlidePosition::After(after))
    }

    pub fn add_slide(
        &self,
        slide: NewSlide,
        position: SlidePosition,
    ) -> Result<NodeId, ProvenanceError> {
        let id = self.write_inner().graph.add_slide(slide, position)?;
        self.emit(GraphEvent::SlideAdded { slide: id });
        Ok(id)
    }

    pub fn move_slide(&self, slide: NodeId, position: SlidePosition) -> Result<(), ProvenanceError> {
        self.write_inner().graph.move_slide(slide, position)?;
        self.emit(GraphEvent::SlideMoved { slide });
        Ok(())
    }

    /// Remove a slide, closing the gap in its chain. A selected slide is
    /// dropped from the selection.
    pub fn remove_slide(&self, slide: NodeId) -> Result<SlideNode, ProvenanceError> {
        let (removed, selection) = {
            let mut inner = self.write_inner();
            let removed = inner.graph.remove_slide(slide)?;
            let before = inner.selected.len();
            inner.selected.retain(|s| *s != slide);
            let changed = inner.selected.len() != before;
            (removed, changed.then(|| inner.selected.clone()))
        };
        self.emit(GraphEvent::SlideRemoved { slide });
        if let Some(slides) = selection {
            self.emit(GraphEvent::Select { slides });
        }
        Ok(removed)
    }

    /// Point a slide at another state, or turn it into a text slide with
    /// `None`.
    pub fn set_slide_jump_target(
        &self,
        slide: NodeId,
        state: Option<NodeId>,
    ) -> Result<(), ProvenanceError> {
        Ok(self.write_inner().graph.set_slide_state(slide, state)?)
    }

    pub fn set_slide_timing(
        &self,
        slide: NodeId,
        duration_ms: u64,
        transition_ms: u64,
    ) -> Result<(), ProvenanceError> {
        Ok(self
            .write_inner()
            .graph
            .set_slide_timing(slide, duration_ms, transition_ms)?)
    }

    /// Head slide of every story, oldest story first.
    pub fn slide_chains(&self) -> Vec<SlideNode> {
        let inner = self.read_inner();
        inner
            .graph
            .slide_heads()
            .into_iter()
            .filter_map(|id| inner.graph.slide(id).cloned())
            .collect()
    }

    /// The whole story containing `slide`, from its head.
    pub fn slide_sequence(&self, slide: NodeId) -> Result<Vec<SlideNode>, ProvenanceError> {
        let inner = self.read_inner();
        inner
            .graph
            .slide_sequence(slide)?
            .into_iter()
            .map(|id| Ok(inner.graph.expect_slide(id)?.clone()))
            .collect()
    }

    /// The slide presenting `state`.
    ///
    /// When several slides jump to the same state, the one in the story with
    /// the lowest head id wins, then the lowest slide id within it.
    pub fn slide_for_state(&self, state: NodeId) -> Option<NodeId> {
        let inner = self.read_inner();
        inner
            .graph
            .slides_for_state(state)
            .into_iter()
            .filter_map(|slide| {
                let head = *inner.graph.slide_sequence(slide).ok()?.first()?;
                Some((head, slide))
            })
            .min()
            .map(|(_, slide)| slide)
    }

    /// Select `slide` and, unless it is a text slide, jump to its state.
    pub async fn jump_to_slide(&self, slide: NodeId) -> Result<(), ProvenanceError> {
        let target = self.read_inner().graph.expect_slide(slide)?.state;
        self.select_slide(Some(slide))?;
        match target {
            Some(state) => self.jump_to(state).await,
            None => Ok(()),
        }
    }

    pub fn selected_slides(&self) -> Vec<SlideNode> {
        let inner = self.read_inner();
        inner
            .selected
            .iter()
            .filter_map(|id| inner.graph.slide(*id).cloned())
            .collect()
    }

    /// Select a single slide, or clear the selection with `None`.
    pub fn select_slide(&self, slide: Option<NodeId>) -> Result<(), ProvenanceError> {
        self.select_slides(slide.into_iter().collect())
    }

    /// Replace the selection, e.g. to compare several slides.
    pub fn select_slides(&self, slides: Vec<NodeId>) -> Result<(), ProvenanceError> {
        {
            let mut inner = self.write_inner();
            for id in &slides {
                inner.graph.expect_slide(*id)?;
            }
            let mut unique = Vec::with_capacity(slides.len());
            for id in &slides {
                if !unique.contains(id) {
                    unique.push(*id);
                }
            }
            inner.selected = unique;
        }
        let slides = self.read_inner().selected.clone();
        self.emit(GraphEvent::Select { slides });
        Ok(())
    }
}
