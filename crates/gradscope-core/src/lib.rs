//! # gradscope-core
//!
//! Backprop mode stack, scopes and resolution for multi-graph autograd.
//!
//! This crate provides:
//! - [`Context`] — owner of one backprop mode stack and its default policy
//! - [`GraphId`] — opaque name of a computation graph
//! - [`BackpropModeScope`] — RAII guard pushing no-backprop / force-backprop modes
//! - [`is_backprop_required`] and friends — "should this record gradients?"
//! - [`GraphTracked`] / [`Array`] — the graph associations of a tracked value
// - GraphId: names one gradient-tracking graph
// - BackpropMode / ModeStack: immutable mode records and their stack
// - Context: owns a stack; thread-local default context
// - BackpropModeScope: pushes on creation, pops on drop
// - backprop: resolution over graphs, arrays, and stop sets

pub mod array;
pub mod backprop;
pub mod context;
pub mod error;
pub mod graph;
pub mod mode;
pub mod scope;

pub use array::{Array, ArrayNode, GraphTracked};
pub use backprop::{
    is_array_backprop_required, is_backprop_required, is_backprop_required_after_stop,
    is_backprop_required_for, is_backprop_required_in, with_force_backprop,
    with_force_backprop_for, with_no_backprop, with_no_backprop_for,
};
pub use context::{
    default_context, set_default_context, Context, ContextConfig, ContextId, ContextScope,
};
pub use error::{Error, Result};
pub use graph::GraphId;
pub use mode::{BackpropMode, BackpropPolarity, ModeStack};
pub use scope::{
    force_backprop_mode, force_backprop_mode_for, force_backprop_mode_in, no_backprop_mode,
    no_backprop_mode_for, no_backprop_mode_in, BackpropModeScope,
};
