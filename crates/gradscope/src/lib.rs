//! # gradscope
//!
//! Scoped control over gradient recording for multi-graph autograd.
//!
//! This is the facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use gradscope::prelude::*;
//!
//! # fn main() -> gradscope::Result<()> {
//! let ctx = Context::new();
//! let _ctx_scope = ContextScope::new(&ctx);
//! let g = ctx.new_graph_id();
//!
//! let _no_grad = no_backprop_mode()?;
//! assert!(!is_backprop_required_for(g));
//! {
//!     let _force = force_backprop_mode_for(&[g])?;
//!     assert!(is_backprop_required_for(g));
//!     assert!(!is_backprop_required());
//! }
//! assert!(!is_backprop_required_for(g));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `gradscope-core` | Context, GraphId, mode stack, scopes, resolution, Array |
//!
//! ## Modules
//!
//! - [`scope`] — no-backprop / force-backprop scope guards
//! - [`backprop`] — "is backprop required" resolution and closure helpers
//! - [`context`] — contexts, configuration and the thread's default context

/// Re-export core types.
pub use gradscope_core::{
    array::{Array, ArrayNode, GraphTracked},
    context::{Context, ContextConfig, ContextId, ContextScope},
    graph::GraphId,
    mode::{BackpropMode, BackpropPolarity, ModeStack},
    scope::BackpropModeScope,
    Error, Result,
};

pub use gradscope_core::{backprop, context, scope};

/// Convenience imports: `use gradscope::prelude::*;`
pub mod prelude {
    pub use gradscope_core::backprop::{
        is_array_backprop_required, is_backprop_required, is_backprop_required_after_stop,
        is_backprop_required_for, is_backprop_required_in, with_force_backprop,
        with_force_backprop_for, with_no_backprop, with_no_backprop_for,
    };
    pub use gradscope_core::context::{default_context, set_default_context};
    pub use gradscope_core::scope::{
        force_backprop_mode, force_backprop_mode_for, force_backprop_mode_in, no_backprop_mode,
        no_backprop_mode_for, no_backprop_mode_in,
    };
    pub use gradscope_core::{
        Array, BackpropModeScope, BackpropPolarity, Context, ContextConfig, ContextScope, Error,
        GraphId, GraphTracked, Result,
    };
}
