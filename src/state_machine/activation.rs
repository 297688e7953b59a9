// Copyright (c) 2025 - Cowboy AI, Inc.
//! Activation axis: `Inactive <-> Activating <-> Active <-> Deactivating ->
//! Inactive`. Driven by the transition scheduler at a connection's
//! `start_time`/`end_time` rather than directly by aggregator operations.

use serde::{Deserialize, Serialize};

use super::Axis;
use crate::errors::StateTransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl Axis for ActivationState {
    const AXIS_NAME: &'static str = "activation";

    fn transition(&self, target: Self) -> Result<Self, StateTransitionError> {
        use ActivationState::*;

        let allowed = matches!(
            (self, target),
            (Inactive, Activating)
                | (Activating, Inactive)
                | (Activating, Active)
                | (Active, Activating)
                | (Active, Deactivating)
                | (Deactivating, Active)
                | (Deactivating, Inactive)
        );

        if allowed {
            Ok(target)
        } else {
            Err(self.error(target))
        }
    }
}
