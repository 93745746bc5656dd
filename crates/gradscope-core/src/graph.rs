// GraphId — Names one gradient-tracking graph
//
// An array can take part in several independent computation graphs at the
// same time (e.g. a first-order graph and a graph for a higher-order
// derivative). Each graph is named by a GraphId; backprop modes are pushed
// either for one GraphId or for all of them at once.
//
// GraphId carries no structure. It is only compared, hashed and copied.
// GraphId::DEFAULT is reserved as the default graph of every context; fresh
// ids come from a global counter so two contexts never hand out the same id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a computation graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GraphId(u64);

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

impl GraphId {
    /// The graph used when no graph id is given.
    pub const DEFAULT: GraphId = GraphId(0);

    /// Generate a graph id no other caller has received (uses a global
    /// atomic counter). Never returns `DEFAULT`.
    pub fn fresh() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value. Ids built this way are not checked for uniqueness.
    pub const fn from_raw(raw: u64) -> Self {
        GraphId(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// `GraphId::default()` is the reserved `DEFAULT` graph, not a fresh one;
/// use [`GraphId::fresh`] for that.
impl Default for GraphId {
    fn default() -> Self {
        GraphId::DEFAULT
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == GraphId::DEFAULT {
            write!(f, "default")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}
