//! Explicitly registered side effects.
//!
//! An [`Effect`] is a `(match predicate, handler)` pair. The store runs
//! every effect whose predicate accepts an action, in registration order,
//! before the reducer sees that action. Handlers return nothing: an
//! effect can't feed actions back into the store or touch state.

use std::fmt;

use fleetwatch_protocol::Action;

type Matcher = Box<dyn Fn(&Action) -> bool + Send + Sync>;
type Handler = Box<dyn Fn(&Action) + Send + Sync>;

/// One side effect bound to the actions it reacts to.
pub struct Effect {
    name: String,
    matches: Matcher,
    handler: Handler,
}

impl Effect {
    /// Creates an effect with an arbitrary predicate.
    pub fn new<M, H>(name: impl Into<String>, matches: M, handler: H) -> Self
    where
        M: Fn(&Action) -> bool + Send + Sync + 'static,
        H: Fn(&Action) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matches: Box::new(matches),
            handler: Box::new(handler),
        }
    }

    /// Creates an effect that fires for one action kind.
    pub fn on_kind<H>(kind: &'static str, handler: H) -> Self
    where
        H: Fn(&Action) + Send + Sync + 'static,
    {
        Self::new(kind, move |action: &Action| action.kind() == kind, handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the handler if the action matches. Returns whether it ran.
    pub fn run(&self, action: &Action) -> bool {
        if !(self.matches)(action) {
            return false;
        }
        tracing::debug!(effect = %self.name, %action, "running effect");
        (self.handler)(action);
        true
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("name", &self.name).finish_non_exhaustive()
    }
}
