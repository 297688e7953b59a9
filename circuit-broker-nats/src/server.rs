//! `NatsLegResponder`: exposes a local [`LegHandler`] over NATS request/reply
//! so a peer aggregator's [`crate::client::NatsLegHandler`] can reach it.
//!
//! This is the mirror image of the client: it does not implement any part
//! of the protocol adapter (SOAP/XML decoding, authentication) the
//! distilled spec places out of scope — it only bridges the same
//! `LegHandler` trait the in-process backend already implements onto NATS
//! subjects, using the wildcard subscription the teacher's subscriber used
//! for infrastructure events.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use circuit_broker::registry::{LegHandler, ReserveAck};

use crate::subjects::{leg_subject, LegEvent, CIRCUIT_ROOT};
use crate::wire::{ConnectionIdRequest, ReserveAckWire, ReserveRequest, WireLegError, WireResult};

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("nats subscribe failed: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    #[error("nats publish failed: {0}")]
    Publish(#[from] async_nats::PublishError),
}

/// Subscribes to every leg-event subject under one provider NSA and
/// dispatches each inbound request to `handler`, replying on the message's
/// reply subject. Runs until the returned task is aborted or the
/// subscription's underlying connection closes.
pub struct NatsLegResponder {
    client: async_nats::Client,
    provider_nsa: String,
    handler: Arc<dyn LegHandler>,
}

impl NatsLegResponder {
    pub fn new(client: async_nats::Client, provider_nsa: impl Into<String>, handler: Arc<dyn LegHandler>) -> Self {
        Self {
            client,
            provider_nsa: provider_nsa.into(),
            handler,
        }
    }

    pub async fn serve(self) -> Result<JoinHandle<()>, ResponderError> {
        let wildcard = format!("{CIRCUIT_ROOT}.{}.*", sanitized(&self.provider_nsa));
        let mut subscriber = self.client.subscribe(wildcard.clone()).await?;
        tracing::info!(subject = %wildcard, "listening for remote leg requests");

        let client = self.client.clone();
        let handler = self.handler.clone();
        let handle = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let Some(reply) = message.reply.clone() else {
                    tracing::warn!(subject = %message.subject, "leg request with no reply subject, dropping");
                    continue;
                };
                let event = match message.subject.as_str().rsplit('.').next() {
                    Some("reserve") => LegEvent::Reserve,
                    Some("reserve_commit") => LegEvent::ReserveCommit,
                    Some("provision") => LegEvent::Provision,
                    Some("release") => LegEvent::Release,
                    Some("terminate") => LegEvent::Terminate,
                    _ => {
                        tracing::warn!(subject = %message.subject, "unrecognized leg event subject");
                        continue;
                    }
                };

                let response = dispatch(&handler, event, &message.payload).await;
                if let Err(err) = client.publish(reply, response).await {
                    tracing::warn!(error = %err, "failed to publish leg response");
                }
            }
        });

        Ok(handle)
    }
}

fn sanitized(nsa: &str) -> String {
    nsa.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

async fn dispatch(handler: &Arc<dyn LegHandler>, event: LegEvent, payload: &Bytes) -> Bytes {
    match event {
        LegEvent::Reserve => {
            let encoded = match serde_json::from_slice::<ReserveRequest>(payload) {
                Ok(req) => {
                    let result: WireResult<ReserveAckWire> = handler
                        .reserve(req.requester, req.provider, req.security, req.global_reservation_id, req.description, req.connection_id, req.params)
                        .await
                        .map(ReserveAck::into)
                        .map_err(WireLegError::from);
                    serde_json::to_vec(&result)
                }
                Err(err) => serde_json::to_vec(&WireResult::<ReserveAckWire>::Err(decode_error(err))),
            };
            encoded.unwrap_or_default().into()
        }
        LegEvent::ReserveCommit => {
            let encoded = match serde_json::from_slice::<ConnectionIdRequest>(payload) {
                Ok(req) => {
                    let result = handler
                        .reserve_commit(req.requester, req.provider, req.security, req.connection_id)
                        .await
                        .map_err(WireLegError::from);
                    serde_json::to_vec(&result)
                }
                Err(err) => serde_json::to_vec(&WireResult::<circuit_broker::model::ConnectionId>::Err(decode_error(err))),
            };
            encoded.unwrap_or_default().into()
        }
        LegEvent::Provision => {
            let encoded = match serde_json::from_slice::<ConnectionIdRequest>(payload) {
                Ok(req) => {
                    let result = handler
                        .provision(req.requester, req.provider, req.security, req.connection_id)
                        .await
                        .map_err(WireLegError::from);
                    serde_json::to_vec(&result)
                }
                Err(err) => serde_json::to_vec(&WireResult::<circuit_broker::model::ConnectionId>::Err(decode_error(err))),
            };
            encoded.unwrap_or_default().into()
        }
        LegEvent::Release => {
            let encoded = match serde_json::from_slice::<ConnectionIdRequest>(payload) {
                Ok(req) => {
                    let result = handler
                        .release(req.requester, req.provider, req.security, req.connection_id)
                        .await
                        .map_err(WireLegError::from);
                    serde_json::to_vec(&result)
                }
                Err(err) => serde_json::to_vec(&WireResult::<circuit_broker::model::ConnectionId>::Err(decode_error(err))),
            };
            encoded.unwrap_or_default().into()
        }
        LegEvent::Terminate => {
            let encoded = match serde_json::from_slice::<ConnectionIdRequest>(payload) {
                Ok(req) => {
                    let result = handler
                        .terminate(req.requester, req.provider, req.security, req.connection_id)
                        .await
                        .map_err(WireLegError::from);
                    serde_json::to_vec(&result)
                }
                Err(err) => serde_json::to_vec(&WireResult::<circuit_broker::model::ConnectionId>::Err(decode_error(err))),
            };
            encoded.unwrap_or_default().into()
        }
    }
}

fn decode_error(err: serde_json::Error) -> WireLegError {
    WireLegError {
        provider_nsa: "unknown".into(),
        source: "-".into(),
        dest: "-".into(),
        message: format!("request decode failed: {err}"),
    }
}
