//! GetRequestObject (§4.3): the Wallet's fetch of the signed Request
//! Object (JAR). Builds and signs the JWT lazily, at fetch time, rather
//! than at `InitTransaction` — the builder and the state transition are
//! one atomic step, so a Presentation never carries a JAR that was
//! signed but never observed as fetched.

use chrono::Utc;
use serde::Serialize;

use crate::config::VerifierConfig;
use crate::domain::{EmbedMode, PresentationType, RequestId, ResponseMode};
use crate::jose::jws::sign_compact;
use crate::provider::Provider;
use crate::store::PresentationStore;
use crate::{Error, Presentation};
use tracing::debug;

#[derive(Debug, Serialize)]
struct RequestObjectClaims {
    response_type: &'static str,
    client_id: String,
    client_id_scheme: String,
    response_mode: &'static str,
    response_uri: String,
    nonce: String,
    state: String,
    client_metadata: ClientMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    presentation_definition: Option<crate::domain::PresentationDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presentation_definition_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClientMetadata {
    vp_formats: VpFormats,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_signed_response_alg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_encrypted_response_alg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_encrypted_response_enc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwks: Option<Jwks>,
}

#[derive(Debug, Serialize)]
struct VpFormats {
    #[serde(rename = "vc+sd-jwt")]
    vc_sd_jwt: serde_json::Value,
    mso_mdoc: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Jwks {
    keys: Vec<crate::jose::jwk::PublicKeyJwk>,
}

/// Fetch the signed Request Object for `request_id` (§4.3).
///
/// # Errors
///
/// Returns `Error::PresentationDefinitionNotFound` if no Presentation
/// matches `request_id`, `Error::Expired` if it has timed out, or
/// `Error::PresentationNotInExpectedState` if its JAR has already been
/// fetched (the transition is at-most-once).
pub async fn get_request_object(
    config: &VerifierConfig,
    store: &impl PresentationStore,
    provider: &impl Provider,
    request_id: &RequestId,
) -> Result<String, Error> {
    debug!(%request_id, "get_request_object: loading presentation by request_id");
    let presentation = store
        .load_by_request_id(request_id)?
        .ok_or(Error::PresentationDefinitionNotFound)?;
    let now = Utc::now();
    let presentation = presentation.sweep_timeout(now, config.max_age);

    let meta = match &presentation {
        Presentation::Requested(meta) => meta.clone(),
        Presentation::TimedOut { .. } => return Err(Error::Expired),
        Presentation::RequestObjectRetrieved { .. } | Presentation::Submitted { .. } => {
            return Err(Error::PresentationNotInExpectedState)
        }
    };

    // Validates the JARM configuration is internally consistent (fails
    // fast on a misconfigured Verifier rather than leaking it into a
    // broken Request Object).
    config.jarm_option()?;
    let jwks = meta
        .ephemeral_ec_private_key
        .as_ref()
        .map(|pair| Jwks {
            keys: vec![pair.public_jwk()],
        });

    let response_path = match meta.response_mode {
        ResponseMode::DirectPost => "direct_post",
        ResponseMode::DirectPostJwt => "direct_post.jwt",
    };
    let response_uri = format!("{}/wallet/{response_path}", config.public_url);

    let (presentation_definition, presentation_definition_uri) = match &meta.presentation_type {
        PresentationType::IdTokenRequest { .. } => (None, None),
        PresentationType::VpTokenRequest {
            presentation_definition,
        }
        | PresentationType::IdAndVpToken {
            presentation_definition,
            ..
        } => match meta.presentation_definition_mode {
            EmbedMode::ByValue => (Some(presentation_definition.clone()), None),
            EmbedMode::ByReference => (
                None,
                Some(format!(
                    "{}/wallet/presentation-definition/{request_id}",
                    config.public_url
                )),
            ),
        },
    };

    let claims = RequestObjectClaims {
        response_type: response_type_for(&meta.presentation_type),
        client_id: client_id(config),
        client_id_scheme: config.client_id_scheme.clone(),
        response_mode: response_path,
        response_uri,
        nonce: meta.nonce.clone(),
        state: request_id.as_str().to_string(),
        client_metadata: ClientMetadata {
            vp_formats: VpFormats {
                vc_sd_jwt: serde_json::json!({ "sd-jwt_alg_values": ["ES256"] }),
                mso_mdoc: serde_json::json!({ "alg_values": ["ES256"] }),
            },
            authorization_signed_response_alg: config.jarm_signed_response_alg.clone(),
            authorization_encrypted_response_alg: config.jarm_encrypted_response_alg.clone(),
            authorization_encrypted_response_enc: config.jarm_encrypted_response_enc.clone(),
            jwks,
        },
        presentation_definition,
        presentation_definition_uri,
    };
    let payload = serde_json::to_vec(&claims)
        .map_err(|e| Error::ServerError(format!("failed to serialize request object: {e}")))?;
    let jar = sign_compact(&payload, "oauth-authz-req+jwt", provider).await?;

    let presentation = presentation.retrieve_request_object(now)?;
    store.store(presentation)?;

    Ok(jar)
}

/// The `client_id` value this Verifier puts in the JAR and expects back
/// as the Key-Binding JWT audience (`aud`).
#[must_use]
pub(crate) fn client_id(config: &VerifierConfig) -> String {
    format!("{}:{}", config.client_id_scheme, config.client_id)
}

fn response_type_for(presentation_type: &PresentationType) -> &'static str {
    match presentation_type {
        PresentationType::IdTokenRequest { .. } => "id_token",
        PresentationType::VpTokenRequest { .. } => "vp_token",
        PresentationType::IdAndVpToken { .. } => "id_token vp_token",
    }
}
