//! Run state of a page.

use thiserror::Error;
use tracing::debug;

/// States a page moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Built but not listening yet.
    Idle,
    /// Listeners are attached to the page's bus.
    Listening,
    /// Listeners were torn down; the page cannot be restarted.
    Stopped,
}

impl PageState {
    /// Returns `true` while calls are being served.
    #[must_use]
    pub const fn is_listening(self) -> bool {
        matches!(self, Self::Listening)
    }
}

/// Events that drive [`PageState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Attach listeners.
    Start,
    /// Tear listeners down.
    Stop,
}

/// Tracks the page's state.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    state: PageState,
}

impl Lifecycle {
    /// Starts in [`PageState::Idle`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: PageState::Idle,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> PageState {
        self.state
    }

    /// Applies `event`, returning the resulting state.
    ///
    /// Stopping is allowed from any state and is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when starting a page that
    /// is already listening or has been stopped.
    pub fn transition(&mut self, event: LifecycleEvent) -> LifecycleResult<PageState> {
        let next = match (self.state, event) {
            (PageState::Idle, LifecycleEvent::Start) => PageState::Listening,
            (_, LifecycleEvent::Stop) => PageState::Stopped,
            (from, LifecycleEvent::Start) => {
                return Err(LifecycleError::InvalidTransition { from, event });
            }
        };

        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?event, "page lifecycle transition");
            self.state = next;
        }
        Ok(self.state)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors emitted by the lifecycle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid page transition from {from:?} via {event:?}")]
    InvalidTransition {
        /// State prior to the attempted transition.
        from: PageState,
        /// Event that was rejected.
        event: LifecycleEvent,
    },
}

/// Result alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_stop() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.transition(LifecycleEvent::Start), Ok(PageState::Listening));
        assert!(lifecycle.state().is_listening());
        assert_eq!(lifecycle.transition(LifecycleEvent::Stop), Ok(PageState::Stopped));
        assert_eq!(lifecycle.transition(LifecycleEvent::Stop), Ok(PageState::Stopped));
    }

    #[test]
    fn cannot_start_twice_or_restart() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleEvent::Start).unwrap();
        assert_eq!(
            lifecycle.transition(LifecycleEvent::Start),
            Err(LifecycleError::InvalidTransition {
                from: PageState::Listening,
                event: LifecycleEvent::Start,
            })
        );

        lifecycle.transition(LifecycleEvent::Stop).unwrap();
        assert!(lifecycle.transition(LifecycleEvent::Start).is_err());
    }
}
