//! # Verifier Core Errors
//!
//! Error taxonomy for the presentation lifecycle and Authorisation Response
//! validator: input-shape, lifecycle, cryptographic, and configuration
//! errors.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors raised by the Verifier core.
#[derive(Error, Debug)]
pub enum Error {
    // -- input-shape --
    /// The Authorisation Response (or its JARM envelope) carried no `state`.
    #[error("missing state")]
    MissingState,

    /// `presentation.type` required an `id_token` that was not present.
    #[error("missing id_token")]
    MissingIdToken,

    /// `presentation.type` required a `vp_token`/`presentation_submission`
    /// pair, or a descriptor's JSONPath extracted nothing.
    #[error("missing vp_token or presentation_submission")]
    MissingVpTokenOrPresentationSubmission,

    /// A descriptor named a format this verifier does not recognise.
    #[error("unsupported descriptor format: {0}")]
    InvalidFormat(String),

    // -- lifecycle --
    /// No Presentation exists for the given identifier.
    #[error("presentation not found")]
    PresentationDefinitionNotFound,

    /// The Presentation exists but is not in the state the operation
    /// requires.
    #[error("presentation not in expected state")]
    PresentationNotInExpectedState,

    /// The Authorisation Response's transport did not match the
    /// Presentation's configured `ResponseMode`.
    #[error("unexpected response mode: expected {expected}, got {actual}")]
    UnexpectedResponseMode {
        /// The `ResponseMode` configured at `InitTransaction`.
        expected: &'static str,
        /// The transport the Wallet actually used.
        actual: &'static str,
    },

    /// The Presentation has timed out (`maxAge` elapsed).
    #[error("presentation expired")]
    Expired,

    // -- cryptographic --
    /// The JARM envelope failed to decrypt or its signature did not verify.
    #[error("invalid JARM envelope: {0}")]
    InvalidJarm(String),

    /// The JARM envelope's inner `state` did not match the outer `state`.
    #[error("incorrect state in JARM payload")]
    IncorrectStateInJarm,

    /// SD-JWT signature, disclosure digest, or key-binding verification
    /// failed.
    #[error("invalid SD-JWT presentation: {0}")]
    InvalidSDJwt(String),

    /// mdoc issuer signature, validity window, or doctype check failed.
    #[error("invalid mdoc presentation: {0}")]
    InvalidMdoc(String),

    /// A ZKP-wrapped presentation failed its challenge check, or named a
    /// descriptor with no registered ZKP key.
    #[error("invalid VP token: {0}")]
    InvalidVPToken(String),

    // -- configuration --
    /// The Verifier configuration is internally inconsistent (startup-only).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Catch-all for provider/adapter failures (store I/O, signer failure,
    /// etc) that aren't part of the named taxonomy.
    #[error("server error: {0}")]
    ServerError(String),
}

/// Wire representation of an [`Error`], matching the `{error,
/// error_description}` shape used across the OpenID4VC family.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<String>,
}

impl Error {
    /// A short, stable error code safe to show to callers (never leaks
    /// cryptographic verification internals).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingState => "missing_state",
            Self::MissingIdToken => "missing_id_token",
            Self::MissingVpTokenOrPresentationSubmission => {
                "missing_vp_token_or_presentation_submission"
            }
            Self::InvalidFormat(_) => "invalid_format",
            Self::PresentationDefinitionNotFound => "not_found",
            Self::PresentationNotInExpectedState => "invalid_state",
            Self::UnexpectedResponseMode { .. } => "unexpected_response_mode",
            Self::Expired => "expired",
            Self::InvalidJarm(_) => "invalid_jarm",
            Self::IncorrectStateInJarm => "incorrect_state_in_jarm",
            Self::InvalidSDJwt(_) => "invalid_sd_jwt",
            Self::InvalidMdoc(_) => "invalid_mdoc",
            Self::InvalidVPToken(_) => "invalid_vp_token",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::ServerError(_) => "server_error",
        }
    }

    /// The HTTP status an adapter should map this error to, per spec §6/§7.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::PresentationDefinitionNotFound => 404,
            Self::Expired => 410,
            Self::ServerError(_) => 500,
            _ => 400,
        }
    }

    /// Coarse description, safe to expose. Cryptographic variants are
    /// deliberately vague so as not to leak verification internals.
    fn description(&self) -> Option<String> {
        match self {
            Self::InvalidJarm(_) => Some("failed to decrypt or verify JARM response".to_string()),
            Self::InvalidSDJwt(_) => Some("SD-JWT presentation failed verification".to_string()),
            Self::InvalidMdoc(_) => Some("mdoc presentation failed verification".to_string()),
            Self::InvalidVPToken(_) => Some("VP token failed verification".to_string()),
            Self::UnexpectedResponseMode { expected, actual } => {
                Some(format!("expected {expected}, got {actual}"))
            }
            Self::InvalidFormat(f) => Some(format!("unsupported format: {f}")),
            Self::InvalidConfiguration(d) | Self::ServerError(d) => Some(d.clone()),
            _ => None,
        }
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ErrorBody {
            error: self.code(),
            error_description: self.description(),
        }
        .serialize(serializer)
    }
}
