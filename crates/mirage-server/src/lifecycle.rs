//! Request lifecycle tracking.
//!
//! Every dispatch walks a small state machine:
//!
//! ```text
//! Idle ─→ Matching ─→ BeforeHooks ─→ Handling ─→ AfterHook ─→ Sent
//!  │         │             │             │                     ↑
//!  │         └→ NotFound ──┼─────────────┼─────────────────────┤
//!  │                       └→ Aborted ←──┘─────────────────────┤
//!  └──────────────── preflight (OPTIONS) ──────────────────────┘
//! ```
//!
//! `NotFound` and `Aborted` end the normal path; the only step left after
//! them is sending the error envelope. `Sent` is final, which is what keeps
//! a response from going out twice.
//!
//! The finished [`Lifecycle`] is attached to the response extensions, so
//! tests and outer layers can see which states a request went through.

use std::fmt;

use smallvec::SmallVec;

/// A dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    /// Request received, nothing done yet.
    Idle,
    /// Looking up the route.
    Matching,
    /// Running the before hook and the route middlewares.
    BeforeHooks,
    /// Running the route action.
    Handling,
    /// The action produced an envelope.
    AfterHook,
    /// A response left the dispatcher.
    Sent,
    /// No route matched.
    NotFound,
    /// A middleware or the action failed.
    Aborted,
}

impl DispatchState {
    /// Returns `true` if `next` may follow `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use DispatchState::{AfterHook, Aborted, BeforeHooks, Handling, Idle, Matching, NotFound, Sent};
        matches!(
            (self, next),
            (Idle, Matching | Sent)
                | (Matching, BeforeHooks | NotFound)
                | (BeforeHooks, Handling | Aborted)
                | (Handling, AfterHook | Aborted)
                | (AfterHook | NotFound | Aborted, Sent)
        )
    }

    /// Returns `true` for the error states.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::NotFound | Self::Aborted)
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Matching => "matching",
            Self::BeforeHooks => "before_hooks",
            Self::Handling => "handling",
            Self::AfterHook => "after_hook",
            Self::Sent => "sent",
            Self::NotFound => "not_found",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The states one request passed through, in order.
///
/// # Example
///
/// ```rust
/// use mirage_server::{DispatchState, Lifecycle};
///
/// let mut lifecycle = Lifecycle::new();
/// lifecycle.advance(DispatchState::Matching);
/// lifecycle.advance(DispatchState::NotFound);
/// lifecycle.advance(DispatchState::Sent);
///
/// assert!(lifecycle.is_sent());
/// assert!(lifecycle.passed(DispatchState::NotFound));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    states: SmallVec<[DispatchState; 8]>,
}

impl Lifecycle {
    /// Starts a lifecycle in [`DispatchState::Idle`].
    #[must_use]
    pub fn new() -> Self {
        let mut states = SmallVec::new();
        states.push(DispatchState::Idle);
        Self { states }
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> DispatchState {
        self.states.last().copied().unwrap_or(DispatchState::Idle)
    }

    /// Moves to `next`.
    ///
    /// An illegal transition fails a debug assertion. Release builds log it
    /// at error level and record the state anyway. Returns whether the
    /// transition was legal.
    pub fn advance(&mut self, next: DispatchState) -> bool {
        let from = self.current();
        let legal = from.can_transition_to(next);
        if !legal {
            tracing::error!(from = %from, to = %next, "illegal dispatch transition");
        }
        debug_assert!(legal, "illegal dispatch transition {from} -> {next}");
        self.states.push(next);
        legal
    }

    /// Returns every state in order, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[DispatchState] {
        &self.states
    }

    /// Returns `true` if `state` was visited.
    #[must_use]
    pub fn passed(&self, state: DispatchState) -> bool {
        self.states.contains(&state)
    }

    /// Returns `true` once the response was sent.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.current() == DispatchState::Sent
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, state) in self.states.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(state.as_str())?;
        }
        Ok(())
    }
}
