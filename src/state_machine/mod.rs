// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Generic, reusable state machine scaffolding for modeling the four
//! orthogonal state axes a connection carries (reservation, provision,
//! activation, lifecycle). All state machines are pure functional —
//! transitions are deterministic functions with no side effects. Side
//! effects (persistence, locking) belong to the caller, via
//! [`crate::store::ConnectionStore`]'s compare-and-set operations.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: States are strongly typed enums
//! 2. **Pure Functions**: All transitions are pure
//! 3. **Explicit**: All transitions explicitly defined
//! 4. **Serialized via persistence, not locks**: a transition function is
//!    invoked through a compare-and-set on the persisted value, so exactly
//!    one of two concurrent callers racing the same axis can win

pub mod activation;
pub mod lifecycle;
pub mod provision;
pub mod reservation;

pub use activation::ActivationState;
pub use lifecycle::LifecycleState;
pub use provision::ProvisionState;
pub use reservation::ReservationState;

use crate::errors::StateTransitionError;

/// Result of an axis transition attempt.
pub type AxisResult<S> = Result<S, StateTransitionError>;

/// Trait for one of the four state axes. `target` is the state the caller
/// wants to move to; `transition` either allows the move (returning it
/// unchanged) or rejects it because no edge exists from `self` to `target`.
pub trait Axis: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Name used in `StateTransitionError` messages (e.g. "reservation").
    const AXIS_NAME: &'static str;

    /// Attempt to move from `self` to `target`. Returns `target` on success.
    fn transition(&self, target: Self) -> AxisResult<Self>;

    fn error(&self, target: Self) -> StateTransitionError {
        StateTransitionError {
            axis: Self::AXIS_NAME,
            from: format!("{self:?}"),
            to: format!("{target:?}"),
            actual: format!("{self:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_axis_rejects_backwards_move() {
        let err = ReservationState::Reserved
            .transition(ReservationState::Initial)
            .unwrap_err();
        assert_eq!(err.axis, "reservation");
    }

    #[test]
    fn every_axis_can_reach_its_own_failure_or_terminal_state() {
        assert!(ReservationState::ReserveChecking
            .transition(ReservationState::ReserveFailed)
            .is_ok());
        assert!(ProvisionState::Provisioning
            .transition(ProvisionState::Provisioned)
            .is_ok());
        assert!(ActivationState::Inactive
            .transition(ActivationState::Activating)
            .is_ok());
        assert!(LifecycleState::Terminating
            .transition(LifecycleState::Terminated)
            .is_ok());
    }
}
