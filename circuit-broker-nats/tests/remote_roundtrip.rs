//! End-to-end round trip of a `LegHandler` call over NATS request/reply.
//!
//! Requires a live NATS server; set `NATS_URL` to point at one (defaults to
//! `nats://127.0.0.1:4222`). Ignored by default so `cargo test` doesn't
//! require broker infrastructure in CI environments that don't provide one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use circuit_broker::errors::LegError;
use circuit_broker::model::{
    Bandwidth, ConnectionId, Directionality, Labels, ProviderIdentity, RequesterIdentity,
    SecurityAttrs, ServiceParameters, Stp,
};
use circuit_broker::registry::{LegHandler, LegResult, ReserveAck};
use circuit_broker_nats::{NatsLegHandler, NatsLegResponder};

struct EchoHandler;

#[async_trait]
impl LegHandler for EchoHandler {
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
        Ok(ReserveAck {
            connection_id: connection_id.unwrap_or_else(|| ConnectionId::from_raw("peer-assigned")),
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

    async fn terminate(&self, _: RequesterIdentity, _: ProviderIdentity, _: SecurityAttrs, _connection_id: ConnectionId) -> LegResult<ConnectionId> {
        Err(LegError::new("urn:ogf:network:peer", "px", "py", "simulated peer failure"))
    }
}

fn nats_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string())
}

fn sample_params() -> ServiceParameters {
    ServiceParameters {
        start_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap(),
        source_stp: Stp::new("peer", "p1", Labels::empty()),
        dest_stp: Stp::new("peer", "p2", Labels::empty()),
        bandwidth: Bandwidth::default(),
        directionality: Directionality::Bidirectional,
    }
}

#[tokio::test]
#[ignore = "requires a live NATS server (set NATS_URL)"]
async fn reserve_round_trips_through_nats_request_reply() {
    let client = async_nats::connect(nats_url()).await.expect("connect to nats");

    let responder = NatsLegResponder::new(client.clone(), "urn:ogf:network:peer", Arc::new(EchoHandler));
    let _server_task = responder.serve().await.expect("start responder");

    let handler = NatsLegHandler::new(client, Duration::from_secs(2));

    let ack = handler
        .reserve(
            RequesterIdentity("urn:requester:test".into()),
            ProviderIdentity("urn:ogf:network:peer".into()),
            None,
            None,
            None,
            Some(ConnectionId::from_raw("abc123abc123")),
            sample_params(),
        )
        .await
        .expect("reserve round trip");
    assert_eq!(ack.connection_id, ConnectionId::from_raw("abc123abc123"));

    let err = handler
        .terminate(
            RequesterIdentity("urn:requester:test".into()),
            ProviderIdentity("urn:ogf:network:peer".into()),
            None,
            ConnectionId::from_raw("abc123abc123"),
        )
        .await
        .expect_err("terminate surfaces the peer's simulated failure");
    assert_eq!(err.message, "simulated peer failure");
}
