// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provision axis: `Scheduled <-> Provisioning <-> Provisioned <->
//! Releasing -> Scheduled`. Unlike the reservation axis this one is
//! re-entrant — a connection can be provisioned, released, and
//! re-provisioned across its lifetime.

use serde::{Deserialize, Serialize};

use super::Axis;
use crate::errors::StateTransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionState {
    Scheduled,
    Provisioning,
    Provisioned,
    Releasing,
}

impl Axis for ProvisionState {
    const AXIS_NAME: &'static str = "provision";

    fn transition(&self, target: Self) -> Result<Self, StateTransitionError> {
        use ProvisionState::*;

        let allowed = matches!(
            (self, target),
            (Scheduled, Provisioning)
                | (Provisioning, Scheduled)
                | (Provisioning, Provisioned)
                | (Provisioned, Provisioning)
                | (Provisioned, Releasing)
                | (Releasing, Provisioned)
                | (Releasing, Scheduled)
        );

        if allowed {
            Ok(target)
        } else {
            Err(self.error(target))
        }
    }
}
