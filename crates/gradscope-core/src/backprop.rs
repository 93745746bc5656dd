// Backprop resolution — Should this operation record gradient metadata?
//
// Array and operation code asks these functions before building graph
// edges. They read the mode stack of a context and never modify it.
//
// HOW IT RESOLVES:
//
//   1. For one graph: walk the context's mode stack from the top. The first
//      mode that names the graph, or names no graph at all, decides.
//   2. If no mode applies, the context's default policy decides (true
//      unless the context was configured otherwise).
//   3. For an array: OR over the array's graphs. An array on no graph never
//      needs backprop.
//   4. After stop: the same OR, but graphs in the stop set count as false.
//
// Functions without a `Context` parameter use the current thread's default
// context (see context::default_context).
//
// SCOPED HELPERS:
//
//   with_no_backprop()        — run a closure with backprop disabled everywhere
//   with_no_backprop_for()    — run a closure with backprop disabled on some graphs
//   with_force_backprop()     — run a closure with backprop forced everywhere
//   with_force_backprop_for() — run a closure with backprop forced on some graphs
//
// The closure's scope is popped when it returns or panics.

use crate::array::GraphTracked;
use crate::context::{default_context, Context};
use crate::error::Result;
use crate::graph::GraphId;
use crate::scope::{
    force_backprop_mode, force_backprop_mode_for, no_backprop_mode, no_backprop_mode_for,
};

/// Whether the default graph of the default context needs backprop.
pub fn is_backprop_required() -> bool {
    let context = default_context();
    context.is_backprop_required(context.default_graph_id())
}

/// Whether `graph_id` needs backprop on the default context.
pub fn is_backprop_required_for(graph_id: GraphId) -> bool {
    default_context().is_backprop_required(graph_id)
}

/// Whether `graph_id` needs backprop on `context`.
pub fn is_backprop_required_in(graph_id: GraphId, context: &Context) -> bool {
    context.is_backprop_required(graph_id)
}

/// Whether `array` needs backprop on at least one of its graphs.
pub fn is_array_backprop_required<A>(array: &A) -> bool
where
    A: GraphTracked + ?Sized,
{
    default_context().is_array_backprop_required(array)
}

/// Whether `array` needs backprop on at least one graph outside
/// `stop_graph_ids`.
///
/// Used by code that is itself stopping gradients on some graphs and needs
/// to know whether the remaining graphs still want them.
pub fn is_backprop_required_after_stop<A>(array: &A, stop_graph_ids: &[GraphId]) -> bool
where
    A: GraphTracked + ?Sized,
{
    default_context().is_backprop_required_after_stop(array, stop_graph_ids)
}

/// Run `f` with backprop disabled for every graph.
///
/// # Example
/// ```ignore
/// let y = with_no_backprop(|| model.forward(&x))??;
/// ```
pub fn with_no_backprop<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    let _scope = no_backprop_mode()?;
    Ok(f())
}

/// Run `f` with backprop disabled for `graph_ids`.
pub fn with_no_backprop_for<F, T>(graph_ids: &[GraphId], f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    let _scope = no_backprop_mode_for(graph_ids)?;
    Ok(f())
}

/// Run `f` with backprop forced for every graph.
pub fn with_force_backprop<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    let _scope = force_backprop_mode()?;
    Ok(f())
}

/// Run `f` with backprop forced for `graph_ids`.
pub fn with_force_backprop_for<F, T>(graph_ids: &[GraphId], f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    let _scope = force_backprop_mode_for(graph_ids)?;
    Ok(f())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::context::ContextScope;

    // Each test installs a fresh default context so assertions never depend
    // on modes left on the thread's default one.

    #[test]
    fn test_default_resolution_is_true() {
        let ctx = Context::new();
        let _ctx_scope = ContextScope::new(&ctx);
        assert!(is_backprop_required());
        assert!(is_backprop_required_for(ctx.new_graph_id()));
    }

    #[test]
    fn test_with_no_backprop_restores_stack() {
        let ctx = Context::new();
        let _ctx_scope = ContextScope::new(&ctx);
        let inside = with_no_backprop(is_backprop_required).unwrap();
        assert!(!inside);
        assert!(is_backprop_required());
        assert_eq!(ctx.mode_stack_len(), 0);
    }

    #[test]
    fn test_with_force_backprop_for_named_graph() {
        let ctx = Context::new();
        let _ctx_scope = ContextScope::new(&ctx);
        let ga = ctx.new_graph_id();
        let gb = ctx.new_graph_id();
        with_no_backprop(|| {
            let (a, b) = with_force_backprop_for(&[ga], || {
                (is_backprop_required_for(ga), is_backprop_required_for(gb))
            })
            .unwrap();
            assert!(a);
            assert!(!b);
            assert!(!is_backprop_required_for(ga));
        })
        .unwrap();
        assert!(is_backprop_required_for(ga));
    }

    #[test]
    fn test_array_resolution_uses_default_context() {
        let ctx = Context::new();
        let _ctx_scope = ContextScope::new(&ctx);
        let ga = ctx.new_graph_id();
        let gb = ctx.new_graph_id();
        let x = Array::with_graphs(&[ga, gb]).unwrap();

        assert!(is_array_backprop_required(&x));
        let stopped = with_no_backprop_for(&[ga], || {
            (
                is_array_backprop_required(&x),
                is_backprop_required_after_stop(&x, &[gb]),
            )
        })
        .unwrap();
        assert_eq!(stopped, (true, false));
    }

    #[test]
    fn test_explicit_context_ignores_default() {
        let ctx = Context::new();
        let other = Context::new();
        let _ctx_scope = ContextScope::new(&ctx);
        let _scope = no_backprop_mode().unwrap();
        assert!(!is_backprop_required_in(GraphId::DEFAULT, &ctx));
        assert!(is_backprop_required_in(GraphId::DEFAULT, &other));
    }
}
