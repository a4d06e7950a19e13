//! Verifier configuration (§6, "Configuration (enumerated)").
//!
//! Loading this from environment, file, or secret store is explicitly out
//! of scope (§1); this module only models the validated shape and the
//! invariant that makes `InitTransaction` fail fast rather than at
//! first use.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::{EmbedMode, ResponseMode};
use crate::jose::jwe::{JarmOption, JweAlg, JweEnc};
use crate::jose::jws::JwsAlgorithm;
use crate::Error;

/// The Verifier's static configuration, validated once at startup.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VerifierConfig {
    /// `verifier.clientId`: identifies the Verifier in the JAR.
    pub client_id: String,
    /// `verifier.clientIdScheme`: the `client_id_scheme` the JAR declares
    /// (e.g. `"redirect_uri"`, `"x509_san_dns"`).
    pub client_id_scheme: String,
    /// `verifier.jar.signing.algorithm`: the JAR's signing algorithm.
    pub jar_signing_algorithm: JwsAlgorithm,
    /// `verifier.response.mode`: the default `ResponseMode` for new
    /// transactions that don't override it.
    pub default_response_mode: ResponseMode,
    /// `verifier.clientMetadata.authorizationSignedResponseAlg`: empty
    /// means the JARM envelope is unsigned.
    pub jarm_signed_response_alg: Option<String>,
    /// `verifier.clientMetadata.authorizationEncryptedResponseAlg`.
    pub jarm_encrypted_response_alg: Option<String>,
    /// `verifier.clientMetadata.authorizationEncryptedResponseEnc`.
    pub jarm_encrypted_response_enc: Option<String>,
    /// `verifier.maxAge`: duration before a Presentation times out.
    pub max_age: Duration,
    /// `verifier.publicUrl`: base for `request_uri` and `response_uri`.
    pub public_url: String,
    /// `verifier.requestJwt.embed`: `ByValue` vs `ByReference` for the
    /// JAR itself.
    pub request_jwt_embed: EmbedMode,
    /// `verifier.presentationDefinition.embed`: `ByValue` vs
    /// `ByReference` for the Presentation Definition.
    pub presentation_definition_embed: EmbedMode,
    /// `verifier.issuer.cert`: the Issuer public key (PEM or JWK,
    /// adapter-defined) used for SD-JWT and mdoc verification.
    pub issuer_cert: String,
}

impl VerifierConfig {
    /// Validate this configuration and derive the `JarmOption` it
    /// implies, failing fast the way `InitTransaction` requires (§4.2:
    /// "configuration inconsistency... fails with `InvalidConfiguration`").
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if `default_response_mode =
    /// DirectPostJwt` without a complete (or absent) JARM encryption
    /// pair, or if any declared algorithm name is unrecognised.
    pub fn jarm_option(&self) -> Result<JarmOption, Error> {
        let option = JarmOption::from_config(
            self.jarm_signed_response_alg.as_deref(),
            self.jarm_encrypted_response_alg.as_deref(),
            self.jarm_encrypted_response_enc.as_deref(),
        )?;
        if self.default_response_mode == ResponseMode::DirectPostJwt
            && matches!(option, JarmOption::Unsigned)
        {
            return Err(Error::InvalidConfiguration(
                "DirectPostJwt requires a JARM signing or encryption algorithm".to_string(),
            ));
        }
        Ok(option)
    }

    /// Whether this configuration's JARM option requires encryption
    /// (and therefore a fresh ephemeral key per transaction, I3).
    #[must_use]
    pub fn requires_ephemeral_key(option: JarmOption) -> bool {
        matches!(
            option,
            JarmOption::Encrypted { .. } | JarmOption::SignedAndEncrypted { .. }
        )
    }
}

/// The `(alg, enc)` pair this Verifier advertises for JARM encryption,
/// when configured. A thin, named accessor so callers don't have to
/// destructure `JarmOption` themselves.
#[must_use]
pub fn jarm_encryption_pair(option: JarmOption) -> Option<(JweAlg, JweEnc)> {
    match option {
        JarmOption::Encrypted { alg, enc } => Some((alg, enc)),
        JarmOption::SignedAndEncrypted { enc_alg, enc, .. } => Some((enc_alg, enc)),
        JarmOption::Unsigned | JarmOption::Signed { .. } => None,
    }
}
