// Context — Owner of one backprop mode stack
//
// Every Context owns an independent ModeStack, a default graph id and a
// default backprop policy. Scopes push onto the stack of one context and
// resolution reads the stack of one context, so two contexts never see each
// other's modes.
//
// MEMORY MODEL:
//
//   Context is a handle: Rc<ContextInner>. Cloning it is cheap and every
//   clone refers to the same stack. Scopes keep a clone so the stack they
//   pop from outlives them. Rc + RefCell keep Context !Send, which pins a
//   context to the thread that created it; sharing one across threads means
//   building the synchronization outside this crate.
//
// DEFAULT CONTEXT:
//
//   Each thread has a "current default" context used by every function that
//   is not given one explicitly. It is created lazily on first use and can
//   be replaced with set_default_context() or temporarily with ContextScope.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::array::GraphTracked;
use crate::graph::GraphId;
use crate::mode::{BackpropMode, ModeStack};

/// Unique identifier of a context. Mode records point back to their
/// context through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        ContextId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        ContextId(raw)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// Per-context settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Graph used when callers do not name one (default: `GraphId::DEFAULT`).
    pub default_graph_id: GraphId,
    /// Verdict when no pushed mode covers a graph (default: true).
    pub default_backprop: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_graph_id: GraphId::DEFAULT,
            default_backprop: true,
        }
    }
}

impl ContextConfig {
    /// Set the default graph id.
    pub fn with_default_graph_id(mut self, graph_id: GraphId) -> Self {
        self.default_graph_id = graph_id;
        self
    }

    /// Set the policy used when no mode applies.
    pub fn with_default_backprop(mut self, backprop: bool) -> Self {
        self.default_backprop = backprop;
        self
    }
}

struct ContextInner {
    id: ContextId,
    config: ContextConfig,
    modes: RefCell<ModeStack>,
    /// Backprop mode scopes alive on this context, empty ones included.
    active_scopes: Cell<usize>,
}

/// Handle to an execution context owning a backprop mode stack.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Context(id={}, default_graph={}, default_backprop={}, modes={})",
            self.inner.id,
            self.inner.config.default_graph_id,
            self.inner.config.default_backprop,
            self.mode_stack_len(),
        )
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let id = ContextId::next();
        tracing::debug!(
            context = %id,
            default_graph = %config.default_graph_id,
            default_backprop = config.default_backprop,
            "created context"
        );
        Context {
            inner: Rc::new(ContextInner {
                id,
                config,
                modes: RefCell::new(ModeStack::new()),
                active_scopes: Cell::new(0),
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    pub fn default_graph_id(&self) -> GraphId {
        self.inner.config.default_graph_id
    }

    pub fn default_backprop(&self) -> bool {
        self.inner.config.default_backprop
    }

    /// Allocate a graph id that no other graph uses.
    ///
    /// Graph ids are unique across the whole process, so the id does not
    /// belong to this context; this is [`GraphId::fresh`] for callers that
    /// already hold a context.
    pub fn new_graph_id(&self) -> GraphId {
        GraphId::fresh()
    }

    /// Whether two handles refer to the same context.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn mode_stack_len(&self) -> usize {
        self.inner.modes.borrow().len()
    }

    /// Copy of the mode stack, bottom to top.
    pub fn modes(&self) -> Vec<BackpropMode> {
        self.inner.modes.borrow().modes().to_vec()
    }

    pub(crate) fn mode_stack(&self) -> Ref<'_, ModeStack> {
        self.inner.modes.borrow()
    }

    /// Register a new scope. Returns true if no other scope was alive.
    pub(crate) fn enter_scope(&self) -> bool {
        let active = self.inner.active_scopes.get();
        self.inner.active_scopes.set(active + 1);
        active == 0
    }

    pub(crate) fn exit_scope(&self) {
        let active = self.inner.active_scopes.get();
        self.inner.active_scopes.set(active.saturating_sub(1));
    }

    pub(crate) fn with_mode_stack_mut<R>(&self, f: impl FnOnce(&mut ModeStack) -> R) -> R {
        f(&mut self.inner.modes.borrow_mut())
    }

    /// Whether operations on `graph_id` should currently record gradients.
    ///
    /// The most recently pushed mode covering `graph_id` decides; with no
    /// such mode the context's default policy applies.
    pub fn is_backprop_required(&self, graph_id: GraphId) -> bool {
        let resolved = self.mode_stack().resolve(graph_id);
        match resolved {
            Some(polarity) => polarity.backprop(),
            None => self.default_backprop(),
        }
    }

    /// Whether `array` needs backprop on at least one of its graphs.
    pub fn is_array_backprop_required<A>(&self, array: &A) -> bool
    where
        A: GraphTracked + ?Sized,
    {
        array.graph_ids().any(|id| self.is_backprop_required(id))
    }

    /// Whether `array` needs backprop on at least one of its graphs that is
    /// not in `stop_graph_ids`.
    pub fn is_backprop_required_after_stop<A>(&self, array: &A, stop_graph_ids: &[GraphId]) -> bool
    where
        A: GraphTracked + ?Sized,
    {
        array
            .graph_ids()
            .any(|id| !stop_graph_ids.contains(&id) && self.is_backprop_required(id))
    }
}

thread_local! {
    static DEFAULT_CONTEXT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// The current thread's default context, created on first use.
pub fn default_context() -> Context {
    DEFAULT_CONTEXT.with(|slot| slot.borrow_mut().get_or_insert_with(Context::new).clone())
}

/// Replace the current thread's default context, returning the previous one.
pub fn set_default_context(context: Context) -> Option<Context> {
    tracing::debug!(context = %context.id(), "set default context");
    DEFAULT_CONTEXT.with(|slot| slot.borrow_mut().replace(context))
}

/// Makes a context the thread's default for as long as the scope lives.
///
/// ```ignore
/// let ctx = Context::new();
/// {
///     let _ctx_scope = ContextScope::new(&ctx);
///     assert!(default_context().ptr_eq(&ctx));
/// }
/// ```
pub struct ContextScope {
    installed: Context,
    previous: Option<Context>,
    // Restores a thread-local slot, so it must drop on the same thread.
    _not_send: PhantomData<Rc<()>>,
}

impl ContextScope {
    pub fn new(context: &Context) -> Self {
        ContextScope {
            installed: context.clone(),
            previous: set_default_context(context.clone()),
            _not_send: PhantomData,
        }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let current = DEFAULT_CONTEXT.with(|slot| slot.borrow().clone());
        let in_order = current
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&self.installed));
        if !in_order {
            let found = current.map(|c| c.id().to_string());
            if !std::thread::panicking() {
                panic!(
                    "context scope dropped out of order: installed {}, found {:?}",
                    self.installed.id(),
                    found
                );
            }
            tracing::error!(
                installed = %self.installed.id(),
                ?found,
                "context scope dropped out of order during unwinding"
            );
        }
        let previous = self.previous.take();
        DEFAULT_CONTEXT.with(|slot| *slot.borrow_mut() = previous);
    }
}
