use crate::graph::GraphId;

/// All errors that can occur within gradscope.
///
/// Resolution never fails; only building a scope or attaching a graph to an
/// array can. Nesting violations are programming errors and panic instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The mode stack could not grow to hold the records of a new scope.
    /// Nothing was pushed.
    #[error("mode stack exhausted: could not reserve {requested} record(s)")]
    ModeStackExhausted { requested: usize },

    /// The array already has a node on this graph.
    #[error("array already requires grad on graph {graph_id}")]
    GradAlreadyRequired { graph_id: GraphId },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout gradscope.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
