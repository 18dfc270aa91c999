//! Callout responder: the NATS-facing edge that receives auth-callout
//! requests on `$SYS.REQ.USER.AUTH`, runs them through the
//! [`crate::controller::Controller`] pipeline, and replies with a signed
//! authorization response.
//!
//! Each inbound message is handled in its own task so a slow verify or
//! policy lookup never blocks the subscription loop. Shutdown is cooperative:
//! the loop races the next inbound message against a [`Notify`] and stops
//! accepting new work once notified, while an in-flight counter lets the
//! caller wait for outstanding tasks to finish draining.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_nats::{HeaderMap, HeaderValue, Message};
use futures::StreamExt;
use nats_jwt_rs::authorization::{AuthRequest, AuthResponse};
use nats_jwt_rs::Claims;
use nkeys::XKey;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::controller::{AuthRequest as PipelineRequest, Controller};
use crate::error::{Error, ErrorKind};

/// The well-known NATS auth-callout request subject.
pub const AUTH_CALLOUT_SUBJECT: &str = "$SYS.REQ.USER.AUTH";

/// Header carrying the server's public curve key when the callout envelope
/// is encrypted.
const SERVER_XKEY_HEADER: &str = "Nats-Server-Xkey";

const GENERIC_AUTH_FAILURE: &str = "authentication failed";
const GENERIC_INTERNAL_FAILURE: &str = "internal error";

/// Configuration the responder needs beyond the controller it wraps.
pub struct CalloutConfig {
    /// Queue group name, so multiple responder instances load-balance.
    pub queue_group: String,
    /// Credential TTL, in seconds, to request for every issued user JWT.
    pub ttl_secs: u64,
    /// Keypair the responder signs its [`AuthResponse`] envelopes with (the
    /// `AUTH` account's signing key, distinct from any target account's
    /// signer used inside [`crate::credential`]).
    pub signing_key: nkeys::KeyPair,
    /// Curve keypair used to decrypt/encrypt the callout envelope, if the
    /// deployment has `auth_callout.xkey` configured on the NATS server.
    pub encryption_key: Option<XKey>,
}

/// Receives, authenticates, and replies to auth-callout requests.
pub struct CalloutResponder {
    client: async_nats::Client,
    controller: Controller,
    queue_group: String,
    ttl_secs: u64,
    signing_key: nkeys::KeyPair,
    encryption_key: Option<XKey>,
    in_flight: Arc<AtomicUsize>,
}

impl CalloutResponder {
    /// Build a responder over an already-connected NATS client.
    #[must_use]
    pub fn new(client: async_nats::Client, controller: Controller, config: CalloutConfig) -> Self {
        Self {
            client,
            controller,
            queue_group: config.queue_group,
            ttl_secs: config.ttl_secs,
            signing_key: config.signing_key,
            encryption_key: config.encryption_key,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The number of auth-callout requests currently being handled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Subscribe and serve auth-callout requests until `shutdown` is
    /// notified. Each request is handled in its own spawned task; `run`
    /// returns once no new message is accepted, without waiting for
    /// in-flight tasks (poll [`Self::in_flight`] for drain).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Nats`] if the subscription cannot be established.
    pub async fn run(self: Arc<Self>, shutdown: Arc<Notify>) -> Result<(), Error> {
        let mut sub = self
            .client
            .queue_subscribe(AUTH_CALLOUT_SUBJECT, self.queue_group.clone())
            .await
            .map_err(|e| Error::Nats(e.to_string()))?;

        debug!(subject = AUTH_CALLOUT_SUBJECT, queue = %self.queue_group, "listening for auth-callout requests");

        loop {
            let msg = tokio::select! {
                biased;
                () = shutdown.notified() => {
                    debug!("shutdown requested, stopping auth-callout listener");
                    break;
                }
                next = sub.next() => next,
            };

            let Some(msg) = msg else {
                break;
            };

            let responder = Arc::clone(&self);
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                responder.handle_message(msg).await;
                responder.in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }

        Ok(())
    }

    async fn handle_message(&self, msg: Message) {
        let Some(reply) = msg.reply.clone() else {
            warn!("auth-callout request had no reply subject, dropping");
            return;
        };

        // The broker blocks the connecting client on this reply, so every
        // path below — even a malformed or undecodable request — must
        // publish a generic-error response rather than drop the message.
        let mut response = AuthResponse::generic_claim(String::new());

        let payload = match self.decrypt_payload(&msg) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to decrypt auth-callout envelope");
                response.nats.error = GENERIC_INTERNAL_FAILURE.to_string();
                self.reply(&msg, reply.clone(), response).await;
                return;
            }
        };

        let text = match std::str::from_utf8(&payload) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "auth-callout payload was not valid utf-8");
                response.nats.error = GENERIC_AUTH_FAILURE.to_string();
                self.reply(&msg, reply.clone(), response).await;
                return;
            }
        };

        let auth = match Claims::<AuthRequest>::decode(text) {
            Ok(decoded) => decoded.payload().clone(),
            Err(e) => {
                warn!(error = %e, "failed to decode auth-callout request");
                response.nats.error = GENERIC_AUTH_FAILURE.to_string();
                self.reply(&msg, reply.clone(), response).await;
                return;
            }
        };

        let server_id = auth.server.id.clone();
        let user_nkey = auth.user_nkey.clone();
        let connect_token = auth.connect_opts.auth_token.clone().unwrap_or_default();

        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let pipeline_request = PipelineRequest {
            connect_token: &connect_token,
            caller_public_key: Some(user_nkey.clone()),
            ttl: self.ttl_secs,
            issued_at,
        };

        response = AuthResponse::generic_claim(user_nkey);
        response.aud = Some(server_id);

        match self.controller.authenticate(pipeline_request).await {
            Ok(result) => {
                for warning in &result.compilation.warnings {
                    debug!(user = %result.user.id, %warning, "policy compilation warning");
                }
                response.nats.jwt = result.credential;
                response.issuer_account = result.issuer_account_public_key;
            }
            Err(err) => {
                warn!(phase = ?err.phase, kind = ?err.kind, user = ?err.user_id, error = %err.message, "auth-callout request failed");
                response.nats.error = generic_message(err.kind).to_string();
            }
        }

        self.reply(&msg, reply, response).await;
    }

    /// Sign, encrypt, and publish `response` to `reply`, replying to the
    /// original `msg`'s server xkey header if the envelope was encrypted.
    async fn reply(&self, msg: &Message, reply: async_nats::Subject, response: AuthResponse) {
        let encoded = match response.encode(&self.signing_key) {
            Ok(jwt) => jwt,
            Err(e) => {
                warn!(error = %e, "failed to sign auth-callout response");
                return;
            }
        };

        let publish_result = match self.encrypt_payload(encoded.into_bytes(), msg) {
            Ok((payload, headers)) => match headers {
                Some(headers) => {
                    self.client
                        .publish_with_headers(reply, headers, payload)
                        .await
                }
                None => self.client.publish(reply, payload).await,
            },
            Err(e) => {
                warn!(error = %e, "failed to encrypt auth-callout response");
                return;
            }
        };

        if let Err(e) = publish_result {
            warn!(error = %e, "failed to publish auth-callout response");
        }
    }

    /// Decrypt `msg`'s payload if the envelope carries a server xkey header
    /// and this responder has an encryption key configured; otherwise return
    /// the payload unchanged.
    fn decrypt_payload(&self, msg: &Message) -> Result<Vec<u8>, Error> {
        let Some(encryption_key) = &self.encryption_key else {
            return Ok(msg.payload.to_vec());
        };
        let Some(headers) = &msg.headers else {
            return Ok(msg.payload.to_vec());
        };
        let Some(server_key_header) = headers.get(SERVER_XKEY_HEADER) else {
            return Ok(msg.payload.to_vec());
        };
        let server_key = XKey::from_public_key(server_key_header.as_str())
            .map_err(|e| Error::Signing(format!("invalid server xkey: {e}")))?;
        encryption_key
            .open(&msg.payload, &server_key)
            .map_err(|e| Error::Signing(format!("failed to decrypt auth-callout envelope: {e}")))
    }

    /// Encrypt a reply payload back to the peer that encrypted the request,
    /// if this responder has an encryption key and the original request was
    /// itself encrypted. Returns headers carrying this responder's public
    /// xkey when encryption was applied.
    fn encrypt_payload(
        &self,
        payload: Vec<u8>,
        original: &Message,
    ) -> Result<(bytes::Bytes, Option<HeaderMap>), Error> {
        let Some(encryption_key) = &self.encryption_key else {
            return Ok((payload.into(), None));
        };
        let Some(headers) = &original.headers else {
            return Ok((payload.into(), None));
        };
        let Some(server_key_header) = headers.get(SERVER_XKEY_HEADER) else {
            return Ok((payload.into(), None));
        };
        let server_key = XKey::from_public_key(server_key_header.as_str())
            .map_err(|e| Error::Signing(format!("invalid server xkey: {e}")))?;
        let sealed = encryption_key
            .seal(&payload, &server_key)
            .map_err(|e| Error::Signing(format!("failed to encrypt auth-callout response: {e}")))?;
        let mut reply_headers = HeaderMap::new();
        let our_key: HeaderValue = encryption_key
            .public_key()
            .parse()
            .map_err(|_| Error::Signing("xkey public key is not a valid header value".to_string()))?;
        reply_headers.insert(SERVER_XKEY_HEADER, our_key);
        Ok((sealed.into(), Some(reply_headers)))
    }
}

/// Map an internal [`ErrorKind`] to one of the two fixed strings ever sent
/// over the wire, never the underlying message.
fn generic_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => GENERIC_INTERNAL_FAILURE,
        _ => GENERIC_AUTH_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_map_to_internal_failure_string() {
        assert_eq!(generic_message(ErrorKind::Internal), GENERIC_INTERNAL_FAILURE);
    }

    #[test]
    fn auth_errors_map_to_generic_auth_failure_string() {
        assert_eq!(generic_message(ErrorKind::InvalidCredentials), GENERIC_AUTH_FAILURE);
        assert_eq!(generic_message(ErrorKind::ProviderAmbiguous), GENERIC_AUTH_FAILURE);
        assert_eq!(generic_message(ErrorKind::RoleNotFound), GENERIC_AUTH_FAILURE);
    }

    #[test]
    fn xkey_seal_and_open_round_trip() {
        let server = XKey::new();
        let responder = XKey::new();
        let plaintext = b"hello auth callout";
        let sealed = server.seal(plaintext, &responder).unwrap();
        let opened = responder.open(&sealed, &server).unwrap();
        assert_eq!(opened, plaintext);
    }
}
