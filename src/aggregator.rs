// Copyright (c) 2025 - Cowboy AI, Inc.
//! The orchestrator. Implements `Reserve`, `ReserveCommit`, `Provision`,
//! `Release` and `Terminate` by validating inputs against the topology,
//! computing a path, persisting records, fanning out per-leg calls through
//! the [`ServiceRegistry`], collecting results, transitioning the parent
//! state, and running compensation on partial failure.
//!
//! Every fan-out is all-or-rollback-best-effort: compensation failures are
//! logged but never override the original failure, and the set of failures
//! (not just the first) determines the message surfaced to the requester.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::errors::{format_aggregate_error, AggregatorError, AggregatorResult, LegError};
use crate::model::{
    Bandwidth, ConnectionId, ConnectionStates, Nsa, ProviderIdentity, RequesterIdentity,
    SecurityAttrs, ServiceConnection, ServiceParameters, Stp, SubConnection,
};
use crate::registry::{Event, Locality, ServiceRegistry};
use crate::scheduler::TransitionScheduler;
use crate::state_machine::{Axis, LifecycleState, ProvisionState, ReservationState};
use crate::store::ConnectionStore;
use crate::topology::Topology;

/// Result of a successful `Reserve`, mirroring the distilled external
/// interface's output tuple.
#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    pub connection_id: ConnectionId,
    pub global_reservation_id: Option<String>,
    pub description: Option<String>,
    pub service_parameters: ServiceParameters,
}

/// Ties the topology, the registry, the store and the scheduler together
/// into the five external operations.
pub struct Aggregator {
    topology: Topology,
    registry: ServiceRegistry,
    store: Arc<dyn ConnectionStore>,
    scheduler: Arc<TransitionScheduler>,
    local_network: String,
    id_retry_attempts: u8,
}

impl Aggregator {
    pub fn new(
        topology: Topology,
        registry: ServiceRegistry,
        store: Arc<dyn ConnectionStore>,
        local_network: impl Into<String>,
    ) -> Self {
        let scheduler = Arc::new(TransitionScheduler::new(store.clone()));
        Self {
            topology,
            registry,
            store,
            scheduler,
            local_network: local_network.into(),
            id_retry_attempts: 3,
        }
    }

    pub fn with_id_retry_attempts(mut self, attempts: u8) -> Self {
        self.id_retry_attempts = attempts;
        self
    }

    fn locality_of(&self, network: &str) -> Locality {
        if network == self.local_network {
            Locality::Local
        } else {
            Locality::Remote
        }
    }

    #[tracing::instrument(skip(self, security), fields(connection_id, correlation_id = %uuid::Uuid::now_v7()))]
    pub async fn reserve(
        &self,
        requester: RequesterIdentity,
        _provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: Option<ConnectionId>,
        global_reservation_id: Option<String>,
        description: Option<String>,
        params: ServiceParameters,
        now: DateTime<Utc>,
    ) -> AggregatorResult<ReserveOutcome> {
        // Step 1: caller-supplied id collision check. Modification of an
        // existing reservation is not supported.
        if let Some(ref id) = connection_id {
            if self.store.load_connection(id).await.is_ok() {
                return Err(AggregatorError::ConnectionExists(id.clone()));
            }
        }

        // Step 3: topology validation, including self-loop rejection.
        self.validate_endpoints(&params.source_stp, &params.dest_stp)?;

        // Step 2: id generation (only when the caller didn't supply one),
        // bounded retry on the vanishingly unlikely collision.
        let assigned_id = match connection_id {
            Some(id) => id,
            None => self.generate_unique_id().await?,
        };

        tracing::Span::current().record("connection_id", assigned_id.as_str());

        // Step 4: persist the parent record in its initial states.
        let connection = ServiceConnection {
            connection_id: assigned_id.clone(),
            revision: 0,
            global_reservation_id: global_reservation_id.clone(),
            description: description.clone(),
            requester_identity: requester.clone(),
            reserve_time: now,
            states: ConnectionStates::initial(),
            source: params.source_stp.clone(),
            dest: params.dest_stp.clone(),
            start_time: params.start_time,
            end_time: params.end_time,
            bandwidth: params.bandwidth,
        };
        self.store.save_connection(connection).await?;

        // Step 5: advance reservation to ReserveChecking; this both records
        // intent and serialises against any concurrent operation on the
        // same connection.
        self.transition_connection(&assigned_id, ConnectionStates::initial(), |s| {
            Ok(ConnectionStates {
                reservation: s.reservation.transition(ReservationState::ReserveChecking)?,
                ..*s
            })
        })
        .await?;

        // Step 6: degenerate local path, or shortest of findPaths.
        let path = if params.source_stp.network == params.dest_stp.network {
            vec![crate::model::Link::new(
                params.source_stp.network.clone(),
                params.source_stp.port.clone(),
                params.dest_stp.port.clone(),
                params.source_stp.labels.clone(),
                params.dest_stp.labels.clone(),
            )]
        } else {
            let mut paths = self.topology.find_paths(
                &params.source_stp,
                &params.dest_stp,
                Some(params.bandwidth),
            )?;
            if paths.is_empty() {
                return Err(AggregatorError::Topology(crate::errors::TopologyError::NoPath {
                    source_network: params.source_stp.network.clone(),
                    source_port: params.source_stp.port.clone(),
                    dest_network: params.dest_stp.network.clone(),
                    dest_port: params.dest_stp.port.clone(),
                }));
            }
            paths.remove(0).links().to_vec()
        };

        // Steps 7-8: dispatch every leg concurrently, await all.
        let dispatches = path.iter().enumerate().map(|(order_id, link)| {
            self.dispatch_reserve_leg(
                order_id,
                link,
                &requester,
                &security,
                &global_reservation_id,
                &description,
                &params,
            )
        });
        let results = join_all(dispatches).await;

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(leg) => successes.push(leg),
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            // Step 9: persist every leg as RESERVE_HELD.
            let legs: Vec<SubConnection> = successes
                .into_iter()
                .map(|leg| leg.into_subconnection(assigned_id.clone()))
                .collect();
            self.store.save_legs(legs).await?;

            // Step 10: advance parent to RESERVE_HELD. The lifecycle axis
            // also leaves INITIAL here, since CREATED is the precondition
            // `Terminating` requires and there is no later point at which
            // every successful Reserve passes through uniformly.
            self.transition_connection(
                &assigned_id,
                {
                    let mut s = ConnectionStates::initial();
                    s.reservation = ReservationState::ReserveChecking;
                    s
                },
                |s| {
                    Ok(ConnectionStates {
                        reservation: s.reservation.transition(ReservationState::ReserveHeld)?,
                        lifecycle: s.lifecycle.transition(LifecycleState::Created)?,
                        ..*s
                    })
                },
            )
            .await?;

            self.scheduler
                .schedule_connection_window(assigned_id.clone(), params.start_time, params.end_time, now)
                .await;

            Ok(ReserveOutcome {
                connection_id: assigned_id,
                global_reservation_id,
                description,
                service_parameters: params,
            })
        } else {
            // Step 11: compensate successful legs, fail the parent.
            let total = successes.len() + failures.len();
            self.compensate_reserve_failures(&assigned_id, &requester, &security, successes)
                .await;

            let _ = self
                .transition_connection(
                    &assigned_id,
                    {
                        let mut s = ConnectionStates::initial();
                        s.reservation = ReservationState::ReserveChecking;
                        s
                    },
                    |s| {
                        Ok(ConnectionStates {
                            reservation: s.reservation.transition(ReservationState::ReserveFailed)?,
                            lifecycle: s.lifecycle.transition(LifecycleState::TerminatedFailed)?,
                            ..*s
                        })
                    },
                )
                .await;

            Err(AggregatorError::ConnectionCreate(format_aggregate_error(
                "reservations",
                total,
                &failures,
            )))
        }
    }

    /// Resolves the [`Nsa`] that manages `network`, per the topology's own
    /// `Network::managing_nsa` — the identity a leg's handler call must be
    /// addressed to, not the bare network name.
    fn managing_nsa_of(&self, network: &str) -> Result<Nsa, LegError> {
        self.topology
            .get_network(network)
            .map(|net| Nsa::new(net.managing_nsa.clone()))
            .map_err(|err| LegError::new(network, "-", "-", format!("topology lookup failed: {err}")))
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_reserve_leg(
        &self,
        order_id: usize,
        link: &crate::model::Link,
        requester: &RequesterIdentity,
        security: &SecurityAttrs,
        global_reservation_id: &Option<String>,
        description: &Option<String>,
        params: &ServiceParameters,
    ) -> Result<ReservedLeg, LegError> {
        let locality = self.locality_of(&link.network);
        let handler = self.registry.handler(locality).ok_or_else(|| {
            LegError::new(link.network.clone(), link.src_port.clone(), link.dst_port.clone(), "no handler registered for this leg's locality")
        })?;
        let provider_nsa = self.managing_nsa_of(&link.network)?;

        let leg_params = ServiceParameters {
            start_time: params.start_time,
            end_time: params.end_time,
            source_stp: Stp::new(link.network.clone(), link.src_port.clone(), link.src_labels.clone()),
            dest_stp: Stp::new(link.network.clone(), link.dst_port.clone(), link.dst_labels.clone()),
            bandwidth: params.bandwidth,
            directionality: params.directionality,
        };

        let ack = handler
            .reserve(
                requester.clone(),
                ProviderIdentity(provider_nsa.urn().to_string()),
                security.clone(),
                global_reservation_id.clone(),
                description.clone(),
                None,
                leg_params,
            )
            .await?;

        Ok(ReservedLeg {
            order_id,
            provider_nsa,
            local_link: locality == Locality::Local,
            connection_id: ack.connection_id,
            source: Stp::new(link.network.clone(), link.src_port.clone(), link.src_labels.clone()),
            dest: Stp::new(link.network.clone(), link.dst_port.clone(), link.dst_labels.clone()),
            start_time: params.start_time,
            end_time: params.end_time,
            bandwidth: params.bandwidth,
        })
    }

    async fn compensate_reserve_failures(
        &self,
        parent_id: &ConnectionId,
        requester: &RequesterIdentity,
        security: &SecurityAttrs,
        successes: Vec<ReservedLeg>,
    ) {
        let compensations = successes.into_iter().map(|leg| {
            let locality = self.locality_of(&leg.source.network);
            let leg_provider = ProviderIdentity(leg.provider_nsa.urn().to_string());
            async move {
                let Some(handler) = self.registry.handler(locality) else {
                    tracing::warn!(connection = %parent_id, leg = %leg.connection_id, "no handler to compensate leg");
                    return;
                };
                if let Err(err) = handler
                    .terminate(requester.clone(), leg_provider, security.clone(), leg.connection_id.clone())
                    .await
                {
                    tracing::warn!(connection = %parent_id, leg = %leg.connection_id, error = %err, "compensation terminate failed");
                }
            }
        });
        join_all(compensations).await;
    }

    fn validate_endpoints(&self, source: &Stp, dest: &Stp) -> AggregatorResult<()> {
        self.topology.get_port(&source.network, &source.port)?;
        self.topology.get_port(&dest.network, &dest.port)?;

        if source.network == dest.network
            && source.port == dest.port
            && source.labels == dest.labels
            && source.labels.single_value()
        {
            return Err(AggregatorError::Topology(crate::errors::TopologyError::SelfLoop(
                source.to_string(),
            )));
        }

        Ok(())
    }

    async fn generate_unique_id(&self) -> AggregatorResult<ConnectionId> {
        for _ in 0..self.id_retry_attempts {
            let candidate = ConnectionId::generate();
            if self.store.load_connection(&candidate).await.is_err() {
                return Ok(candidate);
            }
        }
        Err(AggregatorError::InternalServer(
            "exhausted connection id retry attempts".into(),
        ))
    }

    #[tracing::instrument(skip(self, security), fields(correlation_id = %uuid::Uuid::now_v7()))]
    pub async fn reserve_commit(
        &self,
        requester: RequesterIdentity,
        _provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> AggregatorResult<ConnectionId> {
        let connection = self.store.load_connection(&connection_id).await?;
        if connection.states.lifecycle.is_terminal() {
            return Err(AggregatorError::ConnectionGone(connection_id));
        }

        let before = connection.states;
        self.transition_connection(&connection_id, before, |s| {
            Ok(ConnectionStates {
                reservation: s.reservation.transition(ReservationState::ReserveCommitting)?,
                ..*s
            })
        })
        .await?;

        let legs = self.store.load_legs(&connection_id).await?;
        let dispatches = legs.iter().map(|leg| {
            let locality = if leg.local_link { Locality::Local } else { Locality::Remote };
            let leg_provider = ProviderIdentity(leg.provider_nsa.urn().to_string());
            self.dispatch_leg_event(locality, Event::ReserveCommit, &requester, leg_provider, &security, leg.connection_id.clone())
        });
        let results = join_all(dispatches).await;
        let failures: Vec<LegError> = results.into_iter().filter_map(Result::err).collect();

        if failures.is_empty() {
            self.transition_connection(
                &connection_id,
                {
                    let mut s = before;
                    s.reservation = ReservationState::ReserveCommitting;
                    s
                },
                |s| {
                    Ok(ConnectionStates {
                        reservation: s.reservation.transition(ReservationState::Reserved)?,
                        ..*s
                    })
                },
            )
            .await?;
            self.store.bump_revision(&connection_id).await?;
            Ok(connection_id)
        } else {
            // Open question, resolved: quarantine rather than silently
            // commit or blind-rollback. Some legs may already be
            // committed; terminating them here would itself need
            // compensation this phase cannot safely express. Leave the
            // reservation axis at RESERVE_COMMITTING and surface an
            // internal error naming the connection for operator attention.
            tracing::error!(connection = %connection_id, failed = failures.len(), "reserve_commit left in inconsistent state, quarantining");
            Err(AggregatorError::InternalServer(format!(
                "connection {connection_id} left inconsistent by reserve_commit: {}",
                format_aggregate_error("commits", legs.len(), &failures)
            )))
        }
    }

    #[tracing::instrument(skip(self, security), fields(correlation_id = %uuid::Uuid::now_v7()))]
    pub async fn provision(
        &self,
        requester: RequesterIdentity,
        _provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> AggregatorResult<ConnectionId> {
        let connection = self.store.load_connection(&connection_id).await?;
        let before = connection.states;
        self.transition_connection(&connection_id, before, |s| {
            Ok(ConnectionStates {
                provision: s.provision.transition(ProvisionState::Provisioning)?,
                ..*s
            })
        })
        .await?;

        let legs = self.store.load_legs(&connection_id).await?;
        let dispatches = legs.iter().map(|leg| {
            let locality = if leg.local_link { Locality::Local } else { Locality::Remote };
            let leg_provider = ProviderIdentity(leg.provider_nsa.urn().to_string());
            self.dispatch_leg_event(locality, Event::Provision, &requester, leg_provider, &security, leg.connection_id.clone())
        });
        let results = join_all(dispatches).await;

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (leg, result) in legs.iter().zip(results) {
            match result {
                Ok(_) => successes.push(leg.clone()),
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            self.transition_connection(
                &connection_id,
                {
                    let mut s = before;
                    s.provision = ProvisionState::Provisioning;
                    s
                },
                |s| {
                    Ok(ConnectionStates {
                        provision: s.provision.transition(ProvisionState::Provisioned)?,
                        ..*s
                    })
                },
            )
            .await?;
            Ok(connection_id)
        } else {
            let release_dispatches = successes.iter().map(|leg| {
                let locality = if leg.local_link { Locality::Local } else { Locality::Remote };
                let leg_provider = ProviderIdentity(leg.provider_nsa.urn().to_string());
                self.dispatch_leg_event(locality, Event::Release, &requester, leg_provider, &security, leg.connection_id.clone())
            });
            let release_results = join_all(release_dispatches).await;
            for result in release_results {
                if let Err(err) = result {
                    tracing::warn!(connection = %connection_id, error = %err, "compensation release failed during provision rollback");
                }
            }

            let _ = self
                .transition_connection(
                    &connection_id,
                    {
                        let mut s = before;
                        s.provision = ProvisionState::Provisioning;
                        s
                    },
                    |s| {
                        Ok(ConnectionStates {
                            provision: s.provision.transition(ProvisionState::Scheduled)?,
                            ..*s
                        })
                    },
                )
                .await;

            Err(AggregatorError::Provision(format_aggregate_error("provisions", legs.len(), &failures)))
        }
    }

    #[tracing::instrument(skip(self, security), fields(correlation_id = %uuid::Uuid::now_v7()))]
    pub async fn release(
        &self,
        requester: RequesterIdentity,
        _provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> AggregatorResult<ConnectionId> {
        let connection = self.store.load_connection(&connection_id).await?;
        let before = connection.states;
        self.transition_connection(&connection_id, before, |s| {
            Ok(ConnectionStates {
                provision: s.provision.transition(ProvisionState::Releasing)?,
                ..*s
            })
        })
        .await?;

        let legs = self.store.load_legs(&connection_id).await?;
        let dispatches = legs.iter().map(|leg| {
            let locality = if leg.local_link { Locality::Local } else { Locality::Remote };
            let leg_provider = ProviderIdentity(leg.provider_nsa.urn().to_string());
            self.dispatch_leg_event(locality, Event::Release, &requester, leg_provider, &security, leg.connection_id.clone())
        });
        let results = join_all(dispatches).await;
        let failures: Vec<LegError> = results.into_iter().filter_map(Result::err).collect();

        if failures.is_empty() {
            self.transition_connection(
                &connection_id,
                {
                    let mut s = before;
                    s.provision = ProvisionState::Releasing;
                    s
                },
                |s| {
                    Ok(ConnectionStates {
                        provision: s.provision.transition(ProvisionState::Scheduled)?,
                        ..*s
                    })
                },
            )
            .await?;
            self.scheduler.cancel(&connection_id).await;
            Ok(connection_id)
        } else {
            Err(AggregatorError::Release(format_aggregate_error("releases", legs.len(), &failures)))
        }
    }

    #[tracing::instrument(skip(self, security), fields(correlation_id = %uuid::Uuid::now_v7()))]
    pub async fn terminate(
        &self,
        requester: RequesterIdentity,
        _provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> AggregatorResult<ConnectionId> {
        let connection = self.store.load_connection(&connection_id).await?;
        if connection.states.lifecycle == LifecycleState::Terminated {
            return Ok(connection_id);
        }

        let before = connection.states;
        self.transition_connection(&connection_id, before, |s| {
            Ok(ConnectionStates {
                lifecycle: s.lifecycle.transition(LifecycleState::Terminating)?,
                ..*s
            })
        })
        .await?;

        let legs = self.store.load_legs(&connection_id).await?;
        let total = legs.len();
        let dispatches = legs.iter().map(|leg| {
            let locality = if leg.local_link { Locality::Local } else { Locality::Remote };
            let leg_provider = ProviderIdentity(leg.provider_nsa.urn().to_string());
            self.dispatch_leg_event(locality, Event::Terminate, &requester, leg_provider, &security, leg.connection_id.clone())
        });
        let results = join_all(dispatches).await;
        let failures: Vec<LegError> = results.into_iter().filter_map(Result::err).collect();

        if failures.is_empty() {
            self.transition_connection(
                &connection_id,
                {
                    let mut s = before;
                    s.lifecycle = LifecycleState::Terminating;
                    s
                },
                |s| {
                    Ok(ConnectionStates {
                        lifecycle: s.lifecycle.transition(LifecycleState::Terminated)?,
                        ..*s
                    })
                },
            )
            .await?;
            self.scheduler.cancel(&connection_id).await;
            Ok(connection_id)
        } else {
            tracing::error!(connection = %connection_id, failed = failures.len(), total, "terminate left partial state");
            Err(AggregatorError::InternalServer(format!(
                "partial terminate: {}/{total} legs failed to terminate",
                failures.len()
            )))
        }
    }

    /// Dispatches a single leg event. `provider` is the *leg's own*
    /// provider identity (its network's managing NSA, per
    /// [`Aggregator::managing_nsa_of`]) — never the top-level request's
    /// provider, which only names the broker the inbound call was
    /// addressed to and has no bearing on which peer a given leg belongs
    /// to.
    async fn dispatch_leg_event(
        &self,
        locality: Locality,
        event: Event,
        requester: &RequesterIdentity,
        provider: ProviderIdentity,
        security: &SecurityAttrs,
        leg_connection_id: ConnectionId,
    ) -> Result<ConnectionId, LegError> {
        let handler = self.registry.handler(locality).ok_or_else(|| {
            LegError::new("unknown", "-", "-", "no handler registered for this leg's locality")
        })?;

        match event {
            Event::ReserveCommit => {
                handler
                    .reserve_commit(requester.clone(), provider, security.clone(), leg_connection_id)
                    .await
            }
            Event::Provision => {
                handler
                    .provision(requester.clone(), provider, security.clone(), leg_connection_id)
                    .await
            }
            Event::Release => {
                handler
                    .release(requester.clone(), provider, security.clone(), leg_connection_id)
                    .await
            }
            Event::Terminate => {
                handler
                    .terminate(requester.clone(), provider, security.clone(), leg_connection_id)
                    .await
            }
            Event::Reserve | Event::Query => unreachable!("dispatch_leg_event is not used for Reserve or Query"),
        }
    }

    /// Computes the next states by calling `Axis::transition` on whichever
    /// axes `mutate` touches, then commits the move with a compare-and-set
    /// against `expected`. An illegal axis move surfaces as a
    /// `StateTransitionError`; a lost race (another operation moved the
    /// connection first) surfaces as the store's `CompareAndSetFailed`.
    async fn transition_connection(
        &self,
        id: &ConnectionId,
        expected: ConnectionStates,
        mutate: impl FnOnce(&ConnectionStates) -> Result<ConnectionStates, crate::errors::StateTransitionError>,
    ) -> AggregatorResult<()> {
        let next = mutate(&expected)?;
        self.store.compare_and_set_connection(id, expected, next).await?;
        Ok(())
    }
}

/// A leg that completed its `Reserve` dispatch successfully, pending
/// persistence as a [`SubConnection`].
struct ReservedLeg {
    order_id: usize,
    provider_nsa: Nsa,
    local_link: bool,
    connection_id: ConnectionId,
    source: Stp,
    dest: Stp,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    bandwidth: Bandwidth,
}

impl ReservedLeg {
    fn into_subconnection(self, parent_id: ConnectionId) -> SubConnection {
        SubConnection {
            parent_id,
            order_id: self.order_id,
            provider_nsa: self.provider_nsa,
            local_link: self.local_link,
            connection_id: self.connection_id,
            states: {
                let mut s = ConnectionStates::initial();
                s.reservation = ReservationState::ReserveHeld;
                s
            },
            source: self.source,
            dest: self.dest,
            start_time: self.start_time,
            end_time: self.end_time,
            bandwidth: self.bandwidth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bandwidth, Directionality, Labels};
    use crate::registry::{LegHandler, LegResult, ReserveAck};
    use crate::store::InMemoryConnectionStore;
    use crate::topology::{Network, Port};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_time(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    fn params(src_net: &str, src_port: &str, dst_net: &str, dst_port: &str) -> ServiceParameters {
        ServiceParameters {
            start_time: fixed_time(1),
            end_time: fixed_time(2),
            source_stp: Stp::new(src_net, src_port, Labels::empty()),
            dest_stp: Stp::new(dst_net, dst_port, Labels::empty()),
            bandwidth: Bandwidth::default(),
            directionality: Directionality::Bidirectional,
        }
    }

    struct AlwaysSucceeds {
        calls: AtomicUsize,
    }

    impl AlwaysSucceeds {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl LegHandler for AlwaysSucceeds {
        async fn reserve(
            &self,
            _requester: RequesterIdentity,
            _provider: ProviderIdentity,
            _security: SecurityAttrs,
            _global_reservation_id: Option<String>,
            _description: Option<String>,
            connection_id: Option<ConnectionId>,
            _params: ServiceParameters,
        ) -> LegResult<ReserveAck> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ReserveAck {
                connection_id: connection_id.unwrap_or_else(|| ConnectionId::from_raw("leg-generated")),
            })
        }

        async fn reserve_commit(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Ok(connection_id)
        }

        async fn provision(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Ok(connection_id)
        }

        async fn release(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Ok(connection_id)
        }

        async fn terminate(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Ok(connection_id)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl LegHandler for AlwaysFails {
        async fn reserve(
            &self,
            _requester: RequesterIdentity,
            _provider: ProviderIdentity,
            _security: SecurityAttrs,
            _global_reservation_id: Option<String>,
            _description: Option<String>,
            _connection_id: Option<ConnectionId>,
            _params: ServiceParameters,
        ) -> LegResult<ReserveAck> {
            Err(LegError::new("urn:ogf:network:b", "bx", "b2", "simulated failure"))
        }

        async fn reserve_commit(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, _connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Err(LegError::new("urn:ogf:network:b", "bx", "b2", "simulated failure"))
        }

        async fn provision(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, _connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Err(LegError::new("urn:ogf:network:b", "bx", "b2", "simulated failure"))
        }

        async fn release(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Ok(connection_id)
        }

        async fn terminate(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, connection_id: ConnectionId) -> LegResult<ConnectionId> {
            Ok(connection_id)
        }
    }

    fn single_network_topology() -> Topology {
        let mut topo = Topology::new();
        topo.add_network(
            Network::new("N1", "urn:ogf:network:n1")
                .add_port(Port::new("p1"))
                .add_port(Port::new("p2")),
        )
        .unwrap();
        topo
    }

    fn build_aggregator(topology: Topology, handler: Arc<dyn LegHandler>) -> Aggregator {
        let mut registry = ServiceRegistry::new();
        registry.register(Locality::Local, handler);
        let store: Arc<dyn ConnectionStore> = Arc::new(InMemoryConnectionStore::new());
        Aggregator::new(topology, registry, store, "N1")
    }

    fn identities() -> (RequesterIdentity, ProviderIdentity) {
        (
            RequesterIdentity("urn:requester:test".into()),
            ProviderIdentity("urn:provider:test".into()),
        )
    }

    #[tokio::test]
    async fn s1_local_link_reserve_succeeds() {
        let aggregator = build_aggregator(single_network_topology(), Arc::new(AlwaysSucceeds::new()));
        let (requester, provider) = identities();

        let outcome = aggregator
            .reserve(requester, provider, None, None, None, None, params("N1", "p1", "N1", "p2"), fixed_time(0))
            .await
            .unwrap();

        let legs = aggregator.store.load_legs(&outcome.connection_id).await.unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].order_id, 0);
        assert!(legs[0].local_link);

        let connection = aggregator.store.load_connection(&outcome.connection_id).await.unwrap();
        assert_eq!(connection.states.reservation, ReservationState::ReserveHeld);
    }

    #[tokio::test]
    async fn s5_self_loop_is_rejected() {
        let aggregator = build_aggregator(single_network_topology(), Arc::new(AlwaysSucceeds::new()));
        let (requester, provider) = identities();

        let mut p = params("N1", "p1", "N1", "p1");
        p.source_stp.labels = Labels::single(10);
        p.dest_stp.labels = Labels::single(10);

        let err = aggregator
            .reserve(requester, provider, None, None, None, None, p, fixed_time(0))
            .await
            .unwrap_err();

        assert!(matches!(err, AggregatorError::Topology(crate::errors::TopologyError::SelfLoop(_))));
    }

    #[tokio::test]
    async fn distinct_single_valued_labels_on_same_stp_are_not_a_self_loop() {
        let aggregator = build_aggregator(single_network_topology(), Arc::new(AlwaysSucceeds::new()));
        let (requester, provider) = identities();

        let mut p = params("N1", "p1", "N1", "p1");
        p.source_stp.labels = Labels::single(10);
        p.dest_stp.labels = Labels::single(20);

        aggregator
            .reserve(requester, provider, None, None, None, None, p, fixed_time(0))
            .await
            .expect("distinct VLANs on the same port is a legitimate reservation, not a self-loop");
    }

    #[tokio::test]
    async fn s4_reserve_failure_marks_parent_terminated_failed() {
        let aggregator = build_aggregator(single_network_topology(), Arc::new(AlwaysFails));
        let (requester, provider) = identities();

        let err = aggregator
            .reserve(requester, provider, None, None, None, None, params("N1", "p1", "N1", "p2"), fixed_time(0))
            .await
            .unwrap_err();

        assert!(matches!(err, AggregatorError::ConnectionCreate(msg) if msg == "simulated failure"));
    }

    #[tokio::test]
    async fn s6_terminate_is_idempotent() {
        let aggregator = build_aggregator(single_network_topology(), Arc::new(AlwaysSucceeds::new()));
        let (requester, provider) = identities();

        let outcome = aggregator
            .reserve(requester.clone(), provider.clone(), None, None, None, None, params("N1", "p1", "N1", "p2"), fixed_time(0))
            .await
            .unwrap();

        let id = outcome.connection_id;
        aggregator
            .terminate(requester.clone(), provider.clone(), None, id.clone())
            .await
            .unwrap();

        // Second terminate on an already-TERMINATED connection is a no-op success.
        let again = aggregator.terminate(requester, provider, None, id.clone()).await.unwrap();
        assert_eq!(again, id);
    }

    #[tokio::test]
    async fn duplicate_caller_supplied_id_is_rejected() {
        let aggregator = build_aggregator(single_network_topology(), Arc::new(AlwaysSucceeds::new()));
        let (requester, provider) = identities();

        let outcome = aggregator
            .reserve(
                requester.clone(),
                provider.clone(),
                None,
                Some(ConnectionId::from_raw("fixed0001abc")),
                None,
                None,
                params("N1", "p1", "N1", "p2"),
                fixed_time(0),
            )
            .await
            .unwrap();

        let err = aggregator
            .reserve(
                requester,
                provider,
                None,
                Some(outcome.connection_id),
                None,
                None,
                params("N1", "p1", "N1", "p2"),
                fixed_time(0),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AggregatorError::ConnectionExists(_)));
    }
}
