// BackpropModeScope — RAII guard over a region of the mode stack
//
// A scope pushes its modes when it is created and pops exactly those modes
// when it is dropped, on every exit path: normal return, `?` early return,
// or panic unwinding.
//
//   let _no_grad = no_backprop_mode()?;           // [all: Disable]
//   {
//       let _g = force_backprop_mode_for(&[ga])?; // [all: Disable] [ga: Enable]
//       assert!(is_backprop_required_for(ga));
//   }                                             // [all: Disable]
//
// NESTING:
//
//   Scopes must be dropped in the reverse order they were created. A scope
//   remembers the stack length it started from and how many modes it
//   pushed; at drop time the stack must be exactly base + count long. Any
//   other length means a scope created after this one is still alive (or
//   one created before it is already gone), which is a programming error.
//   The scope panics, unless the thread is already unwinding, in which case
//   it logs the violation and truncates to its base.

use std::fmt;

use crate::context::{default_context, Context};
use crate::error::Result;
use crate::graph::GraphId;
use crate::mode::{BackpropMode, BackpropPolarity};

/// Guard holding a batch of backprop modes on one context's stack.
#[must_use = "the backprop mode is popped as soon as the scope is dropped"]
pub struct BackpropModeScope {
    context: Context,
    polarity: BackpropPolarity,
    /// Stack length before this scope pushed.
    base: usize,
    /// Number of modes pushed by this scope.
    n: usize,
    /// No other scope was alive on the context when this one was created.
    is_outermost: bool,
}

impl fmt::Debug for BackpropModeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackpropModeScope(context={}, polarity={}, base={}, n={}, outermost={})",
            self.context.id(),
            self.polarity,
            self.base,
            self.n,
            self.is_outermost,
        )
    }
}

impl BackpropModeScope {
    /// Push `polarity` on `context`.
    ///
    /// `graph_ids == None` pushes one mode covering every graph. `Some(ids)`
    /// pushes one mode per id, duplicates included; an empty slice pushes
    /// nothing. Either every mode is pushed or, on error, none is.
    pub fn new(
        context: &Context,
        polarity: BackpropPolarity,
        graph_ids: Option<&[GraphId]>,
    ) -> Result<Self> {
        let context_id = context.id();
        let (base, n) = context.with_mode_stack_mut(|stack| -> Result<(usize, usize)> {
            let base = stack.len();
            match graph_ids {
                None => stack.push_all([BackpropMode::new(context_id, None, polarity)])?,
                Some(ids) => stack.push_all(
                    ids.iter()
                        .map(|&id| BackpropMode::new(context_id, Some(id), polarity)),
                )?,
            }
            Ok((base, stack.len() - base))
        })?;
        let is_outermost = context.enter_scope();

        tracing::trace!(
            context = %context_id,
            %polarity,
            all_graphs = graph_ids.is_none(),
            pushed = n,
            depth = base + n,
            "enter backprop mode scope"
        );

        Ok(BackpropModeScope {
            context: context.clone(),
            polarity,
            base,
            n,
            is_outermost,
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn polarity(&self) -> BackpropPolarity {
        self.polarity
    }

    /// Number of modes this scope pushed.
    pub fn mode_count(&self) -> usize {
        self.n
    }

    /// Whether no other scope, empty ones included, was alive on the
    /// context when this scope was created.
    pub fn is_outermost(&self) -> bool {
        self.is_outermost
    }
}

impl Drop for BackpropModeScope {
    fn drop(&mut self) {
        self.context.exit_scope();
        if self.n == 0 {
            return;
        }
        let expected = self.base + self.n;
        let base = self.base;
        let mismatch = self.context.with_mode_stack_mut(|stack| {
            let actual = stack.len();
            if actual == expected {
                stack.truncate(base);
                None
            } else {
                Some(actual)
            }
        });

        match mismatch {
            None => tracing::trace!(
                context = %self.context.id(),
                polarity = %self.polarity,
                popped = self.n,
                depth = base,
                "exit backprop mode scope"
            ),
            Some(actual) if std::thread::panicking() => {
                tracing::error!(
                    context = %self.context.id(),
                    expected,
                    actual,
                    "backprop mode scope dropped out of order during unwinding"
                );
                self.context.with_mode_stack_mut(|stack| stack.truncate(base));
            }
            Some(actual) => panic!(
                "backprop mode scope dropped out of order on {}: expected {} modes on the stack, found {}",
                self.context.id(),
                expected,
                actual
            ),
        }
    }
}

/// Disable backprop for every graph of the default context.
pub fn no_backprop_mode() -> Result<BackpropModeScope> {
    BackpropModeScope::new(&default_context(), BackpropPolarity::Disable, None)
}

/// Disable backprop for the listed graphs of the default context.
pub fn no_backprop_mode_for(graph_ids: &[GraphId]) -> Result<BackpropModeScope> {
    BackpropModeScope::new(&default_context(), BackpropPolarity::Disable, Some(graph_ids))
}

/// Force backprop for every graph of the default context.
pub fn force_backprop_mode() -> Result<BackpropModeScope> {
    BackpropModeScope::new(&default_context(), BackpropPolarity::Enable, None)
}

/// Force backprop for the listed graphs of the default context.
pub fn force_backprop_mode_for(graph_ids: &[GraphId]) -> Result<BackpropModeScope> {
    BackpropModeScope::new(&default_context(), BackpropPolarity::Enable, Some(graph_ids))
}

/// Disable backprop on `context`, for every graph (`None`) or the listed ones.
pub fn no_backprop_mode_in(
    context: &Context,
    graph_ids: Option<&[GraphId]>,
) -> Result<BackpropModeScope> {
    BackpropModeScope::new(context, BackpropPolarity::Disable, graph_ids)
}

/// Force backprop on `context`, for every graph (`None`) or the listed ones.
pub fn force_backprop_mode_in(
    context: &Context,
    graph_ids: Option<&[GraphId]>,
) -> Result<BackpropModeScope> {
    BackpropModeScope::new(context, BackpropPolarity::Enable, graph_ids)
}
