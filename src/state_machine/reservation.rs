// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reservation axis: `Initial -> ReserveChecking -> ReserveHeld ->
//! ReserveCommitting -> Reserved`, with `ReserveFailed` reachable from any
//! non-terminal state as an absorbing failure state.

use serde::{Deserialize, Serialize};

use super::Axis;
use crate::errors::StateTransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationState {
    Initial,
    ReserveChecking,
    ReserveHeld,
    ReserveCommitting,
    Reserved,
    ReserveFailed,
}

impl Axis for ReservationState {
    const AXIS_NAME: &'static str = "reservation";

    fn transition(&self, target: Self) -> Result<Self, StateTransitionError> {
        use ReservationState::*;

        let allowed = matches!(
            (self, target),
            (Initial, ReserveChecking)
                | (ReserveChecking, ReserveHeld)
                | (ReserveHeld, ReserveCommitting)
                | (ReserveCommitting, Reserved)
                | (Initial, ReserveFailed)
                | (ReserveChecking, ReserveFailed)
                | (ReserveHeld, ReserveFailed)
                | (ReserveCommitting, ReserveFailed)
        );

        if allowed {
            Ok(target)
        } else {
            Err(self.error(target))
        }
    }
}
