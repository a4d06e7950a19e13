//! The Presentation lifecycle, modeled as a tagged variant rather than a
//! class hierarchy: state is data, and each transition is a total
//! function `(Presentation, Event) -> Result<Presentation, Error>` that
//! consumes the prior state.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ids::{RequestId, ResponseCode, TransactionId};
use super::query::PresentationDefinition;
use super::wallet_response::WalletResponse;
use crate::jose::jwk::{EphemeralEcKeyPair, PublicKeyJwk};
use crate::Error;

/// Fields common to every non-terminal Presentation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresentationMeta {
    /// Verifier-facing identifier.
    pub id: TransactionId,
    /// Wallet-facing identifier, used as the OAuth `state` parameter.
    pub request_id: RequestId,
    /// When `InitTransaction` created this record.
    pub initiated_at: DateTime<Utc>,
    /// What the Wallet was asked to present, fixed at initiation.
    pub presentation_type: PresentationType,
    /// The transport the Wallet's response must arrive over.
    pub response_mode: ResponseMode,
    /// How the Presentation Definition is conveyed in the Request Object.
    pub presentation_definition_mode: EmbedMode,
    /// How the Verifier front-end retrieves the eventual wallet response.
    pub get_wallet_response_method: GetWalletResponseMethod,
    /// Bound into the Request Object and echoed in each VP's proof.
    pub nonce: String,
    /// Present iff `response_mode = DirectPostJwt` (I3): used to decrypt
    /// the Wallet's JARM envelope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_ec_private_key: Option<EphemeralEcKeyPair>,
    /// Present when any requested descriptor uses a ZKP-wrapped format
    /// (I5): maps input-descriptor id to the key its challenge is
    /// verified against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zkp_keys: Option<ZkpKeys>,
}

/// What the Wallet was asked to present, fixed for the life of a
/// Presentation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresentationType {
    /// A bare Self-Issued ID Token.
    IdTokenRequest {
        /// How the ID Token's subject is bound.
        id_token_type: IdTokenType,
    },
    /// A `vp_token` satisfying a Presentation Definition.
    VpTokenRequest {
        /// The Credentials and constraints the Wallet must satisfy.
        presentation_definition: PresentationDefinition,
    },
    /// Both an ID Token and a `vp_token`.
    IdAndVpToken {
        /// How the ID Token's subject is bound.
        id_token_type: IdTokenType,
        /// The Credentials and constraints the Wallet must satisfy.
        presentation_definition: PresentationDefinition,
    },
}

/// SIOPv2 `id_token_type` values.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum IdTokenType {
    /// The subject is the End-User's pairwise/self-issued identifier.
    #[serde(rename = "subject_signed_id_token")]
    SubjectSigned,
    /// The subject is attested by the entity that issued the ID Token.
    #[serde(rename = "attester_signed_id_token")]
    AttesterSigned,
}

/// The transport the Wallet's Authorisation Response must use.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ResponseMode {
    /// Plain, unencrypted form post.
    #[serde(rename = "direct_post")]
    DirectPost,
    /// JARM-wrapped form post.
    #[serde(rename = "direct_post.jwt")]
    DirectPostJwt,
}

/// How the Verifier front-end later retrieves the wallet response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method")]
pub enum GetWalletResponseMethod {
    /// The front-end polls `GET /ui/presentations/{transactionId}`.
    Poll,
    /// The Wallet is redirected to `uri_template` with its single
    /// placeholder filled by the minted `ResponseCode`.
    Redirect {
        /// Template containing exactly one `ResponseCode` placeholder.
        uri_template: String,
    },
}

/// Whether a JWT or Presentation Definition travels inside the Request
/// Object or is fetched from a side-channel URI.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum EmbedMode {
    /// Embedded directly.
    ByValue,
    /// Referenced by URI.
    ByReference,
}

/// Per-descriptor ZKP verification keys (I5), keyed by input-descriptor
/// id. A plain ordered mapping: the key owns no back-pointer to its
/// Presentation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ZkpKeys(pub HashMap<String, PublicKeyJwk>);

impl ZkpKeys {
    /// Look up the verification key registered for `descriptor_id`.
    #[must_use]
    pub fn get(&self, descriptor_id: &str) -> Option<&PublicKeyJwk> {
        self.0.get(descriptor_id)
    }
}

/// Why a Presentation was moved to `TimedOut`. The core sweep only ever
/// produces `Expired`; the field exists so the reason is legible in
/// stores/logs rather than implied by the variant name alone.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TimeoutReason {
    /// `now - initiated_at >= max_age`, with no terminal state reached.
    Expired,
}

/// A single verification transaction, at one of four observable states.
/// `Requested -> RequestObjectRetrieved -> Submitted` is the happy path;
/// `TimedOut` is a terminal leaf reachable from either of the first two
/// (P1). Transitions never reverse.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum Presentation {
    /// Created by `InitTransaction`; awaiting the Wallet's JAR fetch.
    Requested(PresentationMeta),
    /// The Wallet has fetched the JAR; awaiting its Authorisation
    /// Response.
    RequestObjectRetrieved {
        /// Fields fixed at initiation.
        meta: PresentationMeta,
        /// When the Wallet's fetch was observed.
        request_object_retrieved_at: DateTime<Utc>,
    },
    /// The Wallet's response has been fully verified and stored.
    Submitted {
        /// Fields fixed at initiation.
        meta: PresentationMeta,
        /// When verification completed.
        submitted_at: DateTime<Utc>,
        /// The verified response, in the shape `meta.presentation_type`
        /// required.
        wallet_response: WalletResponse,
        /// Present iff `get_wallet_response_method = Redirect` (I4);
        /// consumed the first time it is used to retrieve this response.
        #[serde(skip_serializing_if = "Option::is_none")]
        response_code: Option<ResponseCode>,
    },
    /// No Wallet response arrived (or none was retrieved) within
    /// `max_age` of initiation.
    TimedOut {
        /// Verifier-facing identifier.
        id: TransactionId,
        /// Always `Expired` in the current design.
        reason: TimeoutReason,
        /// When the sweep (or an on-access check) observed the timeout.
        timed_out_at: DateTime<Utc>,
    },
}

impl Presentation {
    /// This Presentation's Verifier-facing identifier, present in every
    /// state.
    #[must_use]
    pub const fn id(&self) -> &TransactionId {
        match self {
            Self::Requested(meta)
            | Self::RequestObjectRetrieved { meta, .. }
            | Self::Submitted { meta, .. } => &meta.id,
            Self::TimedOut { id, .. } => id,
        }
    }

    /// This Presentation's Wallet-facing identifier, where one still
    /// exists (it is dropped once `TimedOut`, per the state's field
    /// list).
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Requested(meta)
            | Self::RequestObjectRetrieved { meta, .. }
            | Self::Submitted { meta, .. } => Some(&meta.request_id),
            Self::TimedOut { .. } => None,
        }
    }

    /// `Requested -> RequestObjectRetrieved` (§4.3): the Wallet has
    /// fetched its JAR. At-most-once: a Presentation already past
    /// `Requested` rejects a second fetch.
    ///
    /// # Errors
    ///
    /// `Error::Expired` if already `TimedOut`; otherwise
    /// `Error::PresentationNotInExpectedState`.
    pub fn retrieve_request_object(self, now: DateTime<Utc>) -> Result<Self, Error> {
        match self {
            Self::Requested(meta) => {
                info!(transaction_id = %meta.id, "request object retrieved");
                Ok(Self::RequestObjectRetrieved {
                    meta,
                    request_object_retrieved_at: now,
                })
            }
            Self::TimedOut { id, .. } => {
                warn!(transaction_id = %id, "request object fetch rejected: expired");
                Err(Error::Expired)
            }
            Self::RequestObjectRetrieved { meta, .. } | Self::Submitted { meta, .. } => {
                warn!(transaction_id = %meta.id, "request object fetch rejected: already retrieved");
                Err(Error::PresentationNotInExpectedState)
            }
        }
    }

    /// `RequestObjectRetrieved -> Submitted` (§4.4 step 9): the Wallet's
    /// response has verified completely. `response_code` must be
    /// present if and only if `get_wallet_response_method = Redirect`
    /// (I4).
    ///
    /// # Errors
    ///
    /// `Error::Expired` if already `TimedOut`; `Error::ServerError` if
    /// `response_code` doesn't match I4; otherwise
    /// `Error::PresentationNotInExpectedState`.
    pub fn submit(
        self,
        wallet_response: WalletResponse,
        response_code: Option<ResponseCode>,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        match self {
            Self::RequestObjectRetrieved { meta, .. } => {
                let wants_redirect =
                    matches!(meta.get_wallet_response_method, GetWalletResponseMethod::Redirect { .. });
                if wants_redirect != response_code.is_some() {
                    warn!(
                        transaction_id = %meta.id,
                        "submit rejected: response_code presence does not match get_wallet_response_method"
                    );
                    return Err(Error::ServerError(
                        "response_code presence does not match get_wallet_response_method"
                            .to_string(),
                    ));
                }
                info!(transaction_id = %meta.id, "presentation submitted");
                Ok(Self::Submitted {
                    meta,
                    submitted_at: now,
                    wallet_response,
                    response_code,
                })
            }
            Self::TimedOut { id, .. } => {
                warn!(transaction_id = %id, "submit rejected: expired");
                Err(Error::Expired)
            }
            Self::Requested(meta) | Self::Submitted { meta, .. } => {
                warn!(transaction_id = %meta.id, "submit rejected: not in expected state");
                Err(Error::PresentationNotInExpectedState)
            }
        }
    }

    /// Move to `TimedOut` if this is a non-terminal record whose age has
    /// reached `max_age`; otherwise return `self` unchanged. Idempotent
    /// and safe to call from both the periodic sweeper and on-access
    /// checks (§4.6).
    #[must_use]
    pub fn sweep_timeout(self, now: DateTime<Utc>, max_age: Duration) -> Self {
        let (id, initiated_at) = match &self {
            Self::Requested(meta) | Self::RequestObjectRetrieved { meta, .. } => {
                (meta.id.clone(), meta.initiated_at)
            }
            Self::Submitted { .. } | Self::TimedOut { .. } => return self,
        };
        if now - initiated_at >= max_age {
            info!(transaction_id = %id, "presentation timed out");
            Self::TimedOut {
                id,
                reason: TimeoutReason::Expired,
                timed_out_at: now,
            }
        } else {
            self
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn meta(get_wallet_response_method: GetWalletResponseMethod) -> PresentationMeta {
        PresentationMeta {
            id: TransactionId::from_raw("txn-1"),
            request_id: RequestId::from_raw("req-1"),
            initiated_at: Utc::now(),
            presentation_type: PresentationType::IdTokenRequest {
                id_token_type: IdTokenType::SubjectSigned,
            },
            response_mode: ResponseMode::DirectPost,
            presentation_definition_mode: EmbedMode::ByValue,
            get_wallet_response_method,
            nonce: "nonce".to_string(),
            ephemeral_ec_private_key: None,
            zkp_keys: None,
        }
    }

    #[test]
    fn happy_path_transitions() {
        let now = Utc::now();
        let p = Presentation::Requested(meta(GetWalletResponseMethod::Poll));
        let p = p.retrieve_request_object(now).unwrap();
        assert!(matches!(p, Presentation::RequestObjectRetrieved { .. }));

        let p = p
            .submit(
                WalletResponse::IdToken {
                    id_token: "jwt".to_string(),
                },
                None,
                now,
            )
            .unwrap();
        assert!(matches!(p, Presentation::Submitted { .. }));
    }

    #[test]
    fn second_request_object_fetch_rejected() {
        let now = Utc::now();
        let p = Presentation::Requested(meta(GetWalletResponseMethod::Poll))
            .retrieve_request_object(now)
            .unwrap();
        let err = p.retrieve_request_object(now).unwrap_err();
        assert!(matches!(err, Error::PresentationNotInExpectedState));
    }

    #[test]
    fn submit_requires_response_code_iff_redirect() {
        let now = Utc::now();
        let p = Presentation::Requested(meta(GetWalletResponseMethod::Redirect {
            uri_template: "/cb?code={}".to_string(),
        }))
        .retrieve_request_object(now)
        .unwrap();

        let err = p
            .submit(
                WalletResponse::IdToken {
                    id_token: "jwt".to_string(),
                },
                None,
                now,
            )
            .unwrap_err();
        assert!(matches!(err, Error::ServerError(_)));
    }

    #[test]
    fn sweep_times_out_stale_requested() {
        let old = Utc::now() - Duration::minutes(10);
        let mut m = meta(GetWalletResponseMethod::Poll);
        m.initiated_at = old;
        let p = Presentation::Requested(m).sweep_timeout(Utc::now(), Duration::minutes(5));
        assert!(matches!(p, Presentation::TimedOut { .. }));
    }

    #[test]
    fn sweep_is_idempotent_and_ignores_submitted() {
        let now = Utc::now();
        let p = Presentation::Requested(meta(GetWalletResponseMethod::Poll));
        let p = p.sweep_timeout(now, Duration::minutes(5));
        assert!(matches!(p, Presentation::Requested(_)));

        let timed_out = Presentation::TimedOut {
            id: TransactionId::from_raw("txn-1"),
            reason: TimeoutReason::Expired,
            timed_out_at: now,
        };
        let swept_again = timed_out.clone().sweep_timeout(now + Duration::days(1), Duration::minutes(5));
        assert!(matches!(swept_again, Presentation::TimedOut { .. }));
    }
}
