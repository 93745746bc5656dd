// Scope tests — The default-context API as downstream array code uses it

use gradscope::prelude::*;

// Helper: run a test body against a fresh default context

fn with_fresh_context<T>(f: impl FnOnce(&Context) -> T) -> T {
    let ctx = Context::new();
    let _ctx_scope = ContextScope::new(&ctx);
    f(&ctx)
}

// Default graph and default context

#[test]
fn test_default_graph_requires_backprop() {
    with_fresh_context(|ctx| {
        assert!(is_backprop_required());
        assert!(is_backprop_required_for(ctx.default_graph_id()));
        assert!(is_backprop_required_in(GraphId::DEFAULT, ctx));
    });
}

#[test]
fn test_configured_default_graph() {
    let g = GraphId::fresh();
    let ctx = Context::with_config(ContextConfig::default().with_default_graph_id(g));
    let _ctx_scope = ContextScope::new(&ctx);

    let _no_g = no_backprop_mode_for(&[g]).unwrap();
    assert!(!is_backprop_required());
    assert!(is_backprop_required_for(GraphId::DEFAULT));
}

#[test]
fn test_no_backprop_mode_on_default_context() {
    with_fresh_context(|ctx| {
        {
            let scope = no_backprop_mode().unwrap();
            assert!(scope.context().ptr_eq(ctx));
            assert_eq!(scope.polarity(), BackpropPolarity::Disable);
            assert!(!is_backprop_required());
        }
        assert!(is_backprop_required());
        assert_eq!(ctx.mode_stack_len(), 0);
    });
}

#[test]
fn test_force_inside_no_backprop() {
    with_fresh_context(|ctx| {
        let ga = ctx.new_graph_id();
        let gb = ctx.new_graph_id();
        let _no_grad = no_backprop_mode().unwrap();
        let _force = force_backprop_mode_for(&[ga]).unwrap();
        assert!(is_backprop_required_for(ga));
        assert!(!is_backprop_required_for(gb));
        assert!(!is_backprop_required());
    });
}

#[test]
fn test_force_all_inside_specific_disable() {
    with_fresh_context(|ctx| {
        let ga = ctx.new_graph_id();
        let _no_ga = no_backprop_mode_for(&[ga]).unwrap();
        assert!(!is_backprop_required_for(ga));
        let _force = force_backprop_mode().unwrap();
        assert!(is_backprop_required_for(ga));
    });
}

#[test]
fn test_scopes_follow_context_switch() {
    let outer = Context::new();
    let _outer_scope = ContextScope::new(&outer);
    let _no_grad = no_backprop_mode().unwrap();
    assert!(!is_backprop_required());

    let inner = Context::new();
    {
        let _inner_scope = ContextScope::new(&inner);
        assert!(is_backprop_required());
        let _no_grad_inner = no_backprop_mode().unwrap();
        assert_eq!(inner.mode_stack_len(), 1);
    }
    assert_eq!(inner.mode_stack_len(), 0);
    assert!(!is_backprop_required());
    assert_eq!(outer.mode_stack_len(), 1);
}

#[test]
fn test_in_constructors_ignore_default_context() {
    with_fresh_context(|ctx| {
        let explicit = Context::new();
        let g = explicit.new_graph_id();
        let _no_grad = no_backprop_mode_in(&explicit, None).unwrap();
        let _force = force_backprop_mode_in(&explicit, Some(&[g][..])).unwrap();
        assert_eq!(explicit.mode_stack_len(), 2);
        assert_eq!(ctx.mode_stack_len(), 0);
        assert!(is_backprop_required());
        assert!(!is_backprop_required_in(GraphId::DEFAULT, &explicit));
        assert!(is_backprop_required_in(g, &explicit));
    });
}

// Closure helpers

#[test]
fn test_with_no_backprop_returns_closure_value() {
    with_fresh_context(|ctx| {
        let (inside, depth) =
            with_no_backprop(|| (is_backprop_required(), ctx.mode_stack_len())).unwrap();
        assert!(!inside);
        assert_eq!(depth, 1);
        assert_eq!(ctx.mode_stack_len(), 0);
    });
}

#[test]
fn test_with_force_backprop_nests() {
    with_fresh_context(|ctx| {
        let g = ctx.new_graph_id();
        let verdicts = with_no_backprop_for(&[g], || {
            let forced = with_force_backprop(|| is_backprop_required_for(g)).unwrap();
            (forced, is_backprop_required_for(g))
        })
        .unwrap();
        assert_eq!(verdicts, (true, false));
    });
}

#[test]
fn test_helper_pops_on_panic() {
    with_fresh_context(|ctx| {
        let result = std::panic::catch_unwind(|| {
            with_no_backprop(|| panic!("forward failed")).unwrap();
        });
        assert!(result.is_err());
        assert_eq!(ctx.mode_stack_len(), 0);
        assert!(is_backprop_required());
    });
}

#[test]
fn test_empty_graph_list_helper() {
    with_fresh_context(|ctx| {
        let depth = with_force_backprop_for(&[], || ctx.mode_stack_len()).unwrap();
        assert_eq!(depth, 0);
    });
}

// Arrays

#[test]
fn test_array_requires_backprop_on_any_graph() {
    with_fresh_context(|ctx| {
        let ga = ctx.new_graph_id();
        let gb = ctx.new_graph_id();
        let x = Array::with_graphs(&[ga, gb]).unwrap();
        let none = Array::new();

        assert!(is_array_backprop_required(&x));
        assert!(!is_array_backprop_required(&none));

        let _no_ga = no_backprop_mode_for(&[ga]).unwrap();
        assert!(is_array_backprop_required(&x));
        let _no_gb = no_backprop_mode_for(&[gb]).unwrap();
        assert!(!is_array_backprop_required(&x));
    });
}

#[test]
fn test_after_stop_on_default_context() {
    with_fresh_context(|ctx| {
        let ga = ctx.new_graph_id();
        let gb = ctx.new_graph_id();
        let x = Array::with_graphs(&[ga, gb]).unwrap();

        assert!(is_backprop_required_after_stop(&x, &[ga]));
        assert!(!is_backprop_required_after_stop(&x, &[ga, gb]));

        let _no_gb = no_backprop_mode_for(&[gb]).unwrap();
        assert!(!is_backprop_required_after_stop(&x, &[ga]));
    });
}

// Threads

#[test]
fn test_threads_have_separate_default_contexts() {
    with_fresh_context(|_| {
        let _no_grad = no_backprop_mode().unwrap();
        assert!(!is_backprop_required());

        let other_thread = std::thread::spawn(is_backprop_required).join().unwrap();
        assert!(other_thread);
    });
}
