// Mode records and the mode stack
//
// A BackpropMode records one pushed mode: the context it belongs to, the
// graph it covers (None = every graph of that context) and its polarity.
// Records are immutable once pushed.
//
// The ModeStack is owned by a Context. It only grows at the tail and only
// shrinks by truncating the tail back to a length a scope remembered, so
// records leave in exactly the reverse order they arrived.
//
// RESOLUTION:
//
//   Scan from the top (most recent) toward the bottom. The first record
//   whose graph is None or equal to the queried graph decides. A later,
//   narrower record therefore shadows an earlier, broader one for the graphs
//   it names, and vice versa.
//
//   stack (bottom → top):  [all: Disable] [gA: Enable]
//   resolve(gA) = Enable   (top record names gA)
//   resolve(gB) = Disable  (falls through to the all-graphs record)

use std::fmt;

use crate::context::ContextId;
use crate::error::{Error, Result};
use crate::graph::GraphId;

/// Whether a mode forces backprop on or off for the graphs it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackpropPolarity {
    /// Stop recording gradient metadata.
    Disable,
    /// Record gradient metadata even inside an enclosing disable.
    Enable,
}

impl BackpropPolarity {
    /// The backprop verdict this polarity produces.
    pub fn backprop(self) -> bool {
        matches!(self, BackpropPolarity::Enable)
    }
}

impl fmt::Display for BackpropPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackpropPolarity::Disable => write!(f, "no-backprop"),
            BackpropPolarity::Enable => write!(f, "force-backprop"),
        }
    }
}

/// One pushed backprop mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackpropMode {
    context_id: ContextId,
    graph_id: Option<GraphId>,
    polarity: BackpropPolarity,
}

impl BackpropMode {
    pub(crate) fn new(
        context_id: ContextId,
        graph_id: Option<GraphId>,
        polarity: BackpropPolarity,
    ) -> Self {
        BackpropMode {
            context_id,
            graph_id,
            polarity,
        }
    }

    /// The context this mode was pushed on.
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// The graph this mode covers, or `None` for every graph.
    pub fn graph_id(&self) -> Option<GraphId> {
        self.graph_id
    }

    pub fn polarity(&self) -> BackpropPolarity {
        self.polarity
    }

    /// `false` for a no-backprop mode, `true` for a force-backprop mode.
    pub fn backprop(&self) -> bool {
        self.polarity.backprop()
    }

    /// Whether this mode governs `graph_id`.
    pub fn applies_to(&self, graph_id: GraphId) -> bool {
        match self.graph_id {
            None => true,
            Some(id) => id == graph_id,
        }
    }
}

/// Ordered stack of backprop modes belonging to one context.
#[derive(Debug, Default)]
pub struct ModeStack {
    modes: Vec<BackpropMode>,
}

impl ModeStack {
    pub fn new() -> Self {
        ModeStack { modes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Records from bottom to top.
    pub fn modes(&self) -> &[BackpropMode] {
        &self.modes
    }

    /// Push every record of `batch` or none of them.
    ///
    /// Room for the whole batch is reserved before the first push, so a
    /// failed reservation leaves the stack exactly as it was.
    pub(crate) fn push_all<I>(&mut self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = BackpropMode>,
        I::IntoIter: ExactSizeIterator,
    {
        let batch = batch.into_iter();
        let requested = batch.len();
        self.modes
            .try_reserve(requested)
            .map_err(|_| Error::ModeStackExhausted { requested })?;
        self.modes.extend(batch);
        Ok(())
    }

    /// Drop every record above `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.modes.truncate(len);
    }

    /// Polarity of the most recent mode covering `graph_id`, if any.
    pub fn resolve(&self, graph_id: GraphId) -> Option<BackpropPolarity> {
        self.modes
            .iter()
            .rev()
            .find(|mode| mode.applies_to(graph_id))
            .map(BackpropMode::polarity)
    }
}
