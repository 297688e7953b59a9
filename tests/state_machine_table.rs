//! Table-driven legality checks across all four state axes (distilled spec
//! §8, invariant 4): a transition on its documented `from` state succeeds,
//! and every other `from` state rejects the same target without mutating.

use circuit_broker::state_machine::{
    ActivationState, Axis, LifecycleState, ProvisionState, ReservationState,
};
use test_case::test_case;

#[test_case(ReservationState::Initial, ReservationState::ReserveChecking, true)]
#[test_case(ReservationState::ReserveChecking, ReservationState::ReserveHeld, true)]
#[test_case(ReservationState::ReserveHeld, ReservationState::ReserveCommitting, true)]
#[test_case(ReservationState::ReserveCommitting, ReservationState::Reserved, true)]
#[test_case(ReservationState::Reserved, ReservationState::ReserveChecking, false)]
#[test_case(ReservationState::Initial, ReservationState::ReserveHeld, false)]
#[test_case(ReservationState::ReserveFailed, ReservationState::ReserveChecking, false)]
fn reservation_axis_transitions(from: ReservationState, to: ReservationState, legal: bool) {
    assert_eq!(from.transition(to).is_ok(), legal);
}

#[test_case(ProvisionState::Scheduled, ProvisionState::Provisioning, true)]
#[test_case(ProvisionState::Provisioning, ProvisionState::Provisioned, true)]
#[test_case(ProvisionState::Provisioned, ProvisionState::Releasing, true)]
#[test_case(ProvisionState::Releasing, ProvisionState::Scheduled, true)]
#[test_case(ProvisionState::Scheduled, ProvisionState::Releasing, false)]
#[test_case(ProvisionState::Provisioned, ProvisionState::Provisioning, false)]
fn provision_axis_transitions(from: ProvisionState, to: ProvisionState, legal: bool) {
    assert_eq!(from.transition(to).is_ok(), legal);
}

#[test_case(ActivationState::Inactive, ActivationState::Activating, true)]
#[test_case(ActivationState::Activating, ActivationState::Active, true)]
#[test_case(ActivationState::Active, ActivationState::Deactivating, true)]
#[test_case(ActivationState::Deactivating, ActivationState::Inactive, true)]
#[test_case(ActivationState::Inactive, ActivationState::Active, false)]
fn activation_axis_transitions(from: ActivationState, to: ActivationState, legal: bool) {
    assert_eq!(from.transition(to).is_ok(), legal);
}

#[test_case(LifecycleState::Initial, LifecycleState::Created, true)]
#[test_case(LifecycleState::Created, LifecycleState::Terminating, true)]
#[test_case(LifecycleState::Terminating, LifecycleState::Terminated, true)]
#[test_case(LifecycleState::Initial, LifecycleState::TerminatedFailed, true)]
#[test_case(LifecycleState::Terminated, LifecycleState::Terminating, false)]
#[test_case(LifecycleState::Initial, LifecycleState::Terminating, false)]
fn lifecycle_axis_transitions(from: LifecycleState, to: LifecycleState, legal: bool) {
    assert_eq!(from.transition(to).is_ok(), legal);
}
