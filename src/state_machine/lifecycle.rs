// Copyright (c) 2025 - Cowboy AI, Inc.
//! Lifecycle axis: `Initial -> Created -> Terminating -> Terminated`, plus
//! two absorbing failure/end-of-schedule states reachable from any
//! non-terminal state: `TerminatedFailed` (reserve/terminate partial
//! failure) and `TerminatedEndtime` (the scheduler's end-time transition
//! fires before an explicit Terminate is requested).
//!
//! `TerminatedEndtime` is not in the distilled four-state table but is
//! required by the Scheduled-transitions behaviour the distilled spec
//! describes; see `SPEC_FULL.md` §4.2.

use serde::{Deserialize, Serialize};

use super::Axis;
use crate::errors::StateTransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Initial,
    Created,
    Terminating,
    Terminated,
    TerminatedFailed,
    TerminatedEndtime,
}

impl LifecycleState {
    /// `true` once the lifecycle has reached any absorbing terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Terminated
                | LifecycleState::TerminatedFailed
                | LifecycleState::TerminatedEndtime
        )
    }
}

impl Axis for LifecycleState {
    const AXIS_NAME: &'static str = "lifecycle";

    fn transition(&self, target: Self) -> Result<Self, StateTransitionError> {
        use LifecycleState::*;

        if self.is_terminal() {
            return Err(self.error(target));
        }

        let allowed = matches!(
            (self, target),
            (Initial, Created)
                | (Created, Terminating)
                | (Terminating, Terminated)
                | (_, TerminatedFailed)
                | (_, TerminatedEndtime)
        );

        if allowed {
            Ok(target)
        } else {
            Err(self.error(target))
        }
    }
}
