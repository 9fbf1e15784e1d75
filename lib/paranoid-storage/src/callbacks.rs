//! Lifecycle hooks as explicit interceptor lists.
//!
//! A chain for one [`Event`] runs in this order:
//!
//! 1. `before` hooks, in registration order;
//! 2. `around` interceptors' `enter`, outermost (first registered) first;
//! 3. the operation itself;
//! 4. `around` interceptors' `exit`, innermost first;
//! 5. `after` hooks, in registration order.
//!
//! A `before` hook or an `enter` returning [`Flow::Halt`] stops the chain:
//! the operation does not run and no `after` hook runs. Interceptors that
//! were already entered still get their `exit`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::Document;

/// Lifecycle events the paranoia protocol runs chains for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Destroy,
    Remove,
    Restore,
}

/// Whether a hook lets the chain continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

pub type BeforeHook = Arc<dyn Fn(&mut Document) -> Flow + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&mut Document) + Send + Sync>;

/// An `around` hook split at the point where the operation runs.
pub trait Interceptor: Send + Sync {
    fn enter(&self, _document: &mut Document) -> Flow {
        Flow::Continue
    }

    fn exit(&self, _document: &mut Document) {}
}

#[derive(Default, Clone)]
struct Chain {
    before: Vec<BeforeHook>,
    around: Vec<Arc<dyn Interceptor>>,
    after: Vec<AfterHook>,
}

/// Hooks registered on a document type, keyed by event.
#[derive(Default, Clone)]
pub struct Callbacks {
    chains: HashMap<Event, Chain>,
}

/// Proof that a chain was entered; hand it back to [`Callbacks::exit`].
#[derive(Debug)]
#[must_use]
pub(crate) struct Entered {
    event: Event,
    depth: usize,
}

impl Callbacks {
    pub fn before(
        &mut self,
        event: Event,
        hook: impl Fn(&mut Document) -> Flow + Send + Sync + 'static,
    ) {
        self.chains
            .entry(event)
            .or_default()
            .before
            .push(Arc::new(hook));
    }

    pub fn around(&mut self, event: Event, interceptor: impl Interceptor + 'static) {
        self.chains
            .entry(event)
            .or_default()
            .around
            .push(Arc::new(interceptor));
    }

    pub fn after(&mut self, event: Event, hook: impl Fn(&mut Document) + Send + Sync + 'static) {
        self.chains
            .entry(event)
            .or_default()
            .after
            .push(Arc::new(hook));
    }

    /// Run the `before` hooks and enter the `around` interceptors.
    ///
    /// Returns `None` when the chain was halted; the caller must then skip
    /// the operation.
    pub(crate) fn enter(&self, event: Event, document: &mut Document) -> Option<Entered> {
        let Some(chain) = self.chains.get(&event) else {
            return Some(Entered { event, depth: 0 });
        };

        for hook in &chain.before {
            if hook(&mut *document) == Flow::Halt {
                debug!(?event, document = %document.document_type().name(), "before hook halted chain");
                return None;
            }
        }

        for (depth, interceptor) in chain.around.iter().enumerate() {
            if interceptor.enter(document) == Flow::Halt {
                debug!(?event, document = %document.document_type().name(), "around hook halted chain");
                for entered in chain.around.iter().take(depth).rev() {
                    entered.exit(document);
                }
                return None;
            }
        }

        Some(Entered {
            event,
            depth: chain.around.len(),
        })
    }

    /// Leave the `around` interceptors and, if the operation completed, run
    /// the `after` hooks.
    pub(crate) fn exit(&self, entered: Entered, document: &mut Document, completed: bool) {
        let Some(chain) = self.chains.get(&entered.event) else {
            return;
        };

        for interceptor in chain.around.iter().take(entered.depth).rev() {
            interceptor.exit(document);
        }

        if completed {
            for hook in &chain.after {
                hook(&mut *document);
            }
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (event, chain) in &self.chains {
            map.entry(
                event,
                &format_args!(
                    "{} before, {} around, {} after",
                    chain.before.len(),
                    chain.around.len(),
                    chain.after.len()
                ),
            );
        }
        map.finish()
    }
}
