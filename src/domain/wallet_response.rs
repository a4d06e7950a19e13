//! The Wallet's Authorisation Response, in both its wire (`...To`, for
//! "transfer object") and domain shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::PresentationSubmission;

/// The decoded form/JWT body a Wallet posted to `/wallet/direct_post` or
/// `/wallet/direct_post.jwt`, before it has been matched against a stored
/// Presentation. Field names match the OpenID4VP wire format.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorisationResponseTo {
    /// Echoes the `state` the Verifier put in the Request Object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Present when `PresentationType::IdTokenRequest` (or
    /// `IdAndVpToken`) was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Present when a `vp_token` was requested. May be a bare string (one
    /// Credential) or a JSON value keyed/nested per the Presentation
    /// Submission's JSONPaths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vp_token: Option<Value>,

    /// Present alongside `vp_token`, describing where each requested
    /// Credential is located within it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<PresentationSubmission>,

    /// Set instead of the above when the Wallet declines or fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable detail accompanying `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// The transport-tagged Authorisation Response as received by the
/// validator. Exactly one variant is accepted per Presentation, gated by
/// its configured `ResponseMode`.
#[derive(Clone, Debug)]
pub enum AuthorisationResponse {
    /// Plain, unencrypted form post to `/wallet/direct_post`.
    DirectPost {
        /// The decoded form body.
        to: AuthorisationResponseTo,
    },

    /// A JARM-wrapped post to `/wallet/direct_post.jwt`: `state` travels
    /// outside the envelope (per OpenID4VP, so the Verifier can look up
    /// the Presentation before attempting to decrypt), `jarm` is the
    /// compact JWT/JWE.
    DirectPostJwt {
        /// The outer (unencrypted) `state` form field.
        state: String,
        /// The JARM envelope: a JWS, a JWE, or a JWE wrapping a JWS.
        jarm: String,
    },
}

impl AuthorisationResponse {
    /// The transport's name, used in `UnexpectedResponseMode` messages.
    #[must_use]
    pub const fn transport_name(&self) -> &'static str {
        match self {
            Self::DirectPost { .. } => "direct_post",
            Self::DirectPostJwt { .. } => "direct_post.jwt",
        }
    }
}

/// The validated result of an Authorisation Response, in the shape
/// required by the Presentation's `PresentationType`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum WalletResponse {
    /// `PresentationType::IdTokenRequest` was satisfied.
    IdToken {
        /// The Self-Issued ID Token.
        #[serde(rename = "idToken")]
        id_token: String,
    },

    /// `PresentationType::VpTokenRequest` was satisfied and every
    /// descriptor's Credential verified.
    VpToken {
        /// Serialized `vp_token`, exactly as extracted.
        #[serde(rename = "vpToken")]
        vp_token: Value,
        /// The submission the Wallet declared and the validator checked.
        #[serde(rename = "presentationSubmission")]
        presentation_submission: PresentationSubmission,
    },

    /// `PresentationType::IdAndVpToken` was satisfied.
    IdAndVpToken {
        /// The Self-Issued ID Token.
        #[serde(rename = "idToken")]
        id_token: String,
        /// Serialized `vp_token`, exactly as extracted.
        #[serde(rename = "vpToken")]
        vp_token: Value,
        /// The submission the Wallet declared and the validator checked.
        #[serde(rename = "presentationSubmission")]
        presentation_submission: PresentationSubmission,
    },

    /// The Wallet declined, or encountered an error of its own.
    Error {
        /// OAuth-style error code (e.g. `access_denied`).
        code: String,
        /// Optional human-readable detail.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}
