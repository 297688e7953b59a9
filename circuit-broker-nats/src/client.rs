//! `NatsLegHandler`: the `Remote`-locality [`LegHandler`] implementation.
//!
//! Stands in for "an RPC client to a peer aggregator" (distilled spec §4.3):
//! every call serializes its arguments, publishes a NATS request to the
//! subject the peer's [`crate::server::NatsLegResponder`] is subscribed on,
//! and waits for a reply up to a caller-supplied deadline. A timeout folds
//! into the same [`LegError`] any other leg failure would surface, so the
//! aggregator's fan-out/compensation logic does not need to special-case it
//! (distilled spec §5, "on timeout, treated as a leg failure").
//!
//! One `NatsLegHandler` is registered for the whole `Remote` locality and
//! addresses whichever peer NSA each call names — the subject is derived
//! from that call's own `provider: ProviderIdentity`, not from anything
//! fixed at construction, since a topology with several remote networks
//! routes legs to several distinct managing NSAs through the same handler.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use circuit_broker::errors::LegError;
use circuit_broker::model::{
    ConnectionId, ProviderIdentity, RequesterIdentity, SecurityAttrs, ServiceParameters,
};
use circuit_broker::registry::{LegHandler, LegResult, ReserveAck};

use crate::subjects::{leg_subject, LegEvent};
use crate::wire::{ConnectionIdRequest, ReserveAckWire, ReserveRequest, WireLegError, WireResult};

/// Dispatches leg events over NATS request/reply, routed per call by the
/// peer NSA named in that call's `provider` argument.
pub struct NatsLegHandler {
    client: async_nats::Client,
    timeout: Duration,
}

impl NatsLegHandler {
    pub fn new(client: async_nats::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn call<Req, Resp>(&self, provider_nsa: &str, event: LegEvent, request: &Req) -> Result<Resp, LegError>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let subject = leg_subject(provider_nsa, event);
        let payload = serde_json::to_vec(request).map_err(|err| {
            LegError::new(provider_nsa, "-", "-", format!("request encode failed: {err}"))
        })?;

        let reply = tokio::time::timeout(self.timeout, self.client.request(subject.clone(), Bytes::from(payload)))
            .await
            .map_err(|_| {
                LegError::new(
                    provider_nsa,
                    "-",
                    "-",
                    format!("timed out after {:?} waiting for {subject}", self.timeout),
                )
            })?
            .map_err(|err| {
                LegError::new(provider_nsa, "-", "-", format!("nats request failed: {err}"))
            })?;

        let decoded: WireResult<Resp> = serde_json::from_slice(&reply.payload).map_err(|err| {
            LegError::new(provider_nsa, "-", "-", format!("response decode failed: {err}"))
        })?;

        decoded.map_err(LegError::from)
    }
}

#[async_trait]
impl LegHandler for NatsLegHandler {
    async fn reserve(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        global_reservation_id: Option<String>,
        description: Option<String>,
        connection_id: Option<ConnectionId>,
        params: ServiceParameters,
    ) -> LegResult<ReserveAck> {
        let provider_nsa = provider.0.clone();
        let request = ReserveRequest {
            requester,
            provider,
            security,
            global_reservation_id,
            description,
            connection_id,
            params,
        };
        let ack: ReserveAckWire = self.call(&provider_nsa, LegEvent::Reserve, &request).await?;
        Ok(ack.into())
    }

    async fn reserve_commit(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId> {
        let provider_nsa = provider.0.clone();
        let request = ConnectionIdRequest { requester, provider, security, connection_id };
        self.call(&provider_nsa, LegEvent::ReserveCommit, &request).await
    }

    async fn provision(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId> {
        let provider_nsa = provider.0.clone();
        let request = ConnectionIdRequest { requester, provider, security, connection_id };
        self.call(&provider_nsa, LegEvent::Provision, &request).await
    }

    async fn release(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId> {
        let provider_nsa = provider.0.clone();
        let request = ConnectionIdRequest { requester, provider, security, connection_id };
        self.call(&provider_nsa, LegEvent::Release, &request).await
    }

    async fn terminate(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId> {
        let provider_nsa = provider.0.clone();
        let request = ConnectionIdRequest { requester, provider, security, connection_id };
        self.call(&provider_nsa, LegEvent::Terminate, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_leg_error_round_trips_through_json() {
        let original = LegError::new("urn:ogf:network:b", "bx", "b2", "boom");
        let wire: WireLegError = original.clone().into();
        let json = serde_json::to_string(&wire).unwrap();
        let decoded: WireLegError = serde_json::from_str(&json).unwrap();
        let back: LegError = decoded.into();
        assert_eq!(back, original);
    }
}
