//! PostWalletResponse (§4.4): the Authorisation Response validator. A
//! single ordered, failure-stop algorithm — extract state, load and
//! gate the Presentation, match transport, unwrap JARM, classify the
//! payload, cryptographically verify every Verifiable Presentation,
//! then transition to `Submitted`. No partial `Submitted` state is ever
//! written (P4): every `?` between the gate and the final `submit`
//! call aborts with the stored Presentation untouched.

use chrono::{DateTime, Utc};
use serde_json::Value;
use serde_json_path::JsonPath;

use super::get_request_object::client_id;
use crate::config::VerifierConfig;
use crate::core::generate;
use crate::domain::{
    AuthorisationResponse, AuthorisationResponseTo, GetWalletResponseMethod, PresentationDefinition,
    PresentationMeta, PresentationSubmission, PresentationType, RequestId, ResponseMode,
    WalletResponse,
};
use crate::jose::jwe::unwrap_jarm;
use crate::provider::Provider;
use crate::store::PresentationStore;
use crate::verify::{mdoc, sd_jwt, zkp};
use crate::{Error, Presentation};
use tracing::{debug, warn};

/// `submit`'s result: a redirect target when `GetWalletResponseMethod =
/// Redirect`, otherwise empty.
#[derive(Clone, Debug, Default)]
pub struct PostWalletResponseResponse {
    /// Present iff the Presentation was configured for `Redirect`.
    pub redirect_uri: Option<String>,
}

/// Validate and record a Wallet's Authorisation Response (§4.4).
///
/// # Errors
///
/// Returns the specific taxonomy member the first failing step names;
/// see the module documentation for the exact ordering. No error
/// variant here ever leaves a Presentation in `Submitted` with an
/// unverified token (P4).
pub async fn post_wallet_response(
    config: &VerifierConfig,
    store: &impl PresentationStore,
    provider: &impl Provider,
    response: AuthorisationResponse,
) -> Result<PostWalletResponseResponse, Error> {
    // 1. Extract state.
    let state = match &response {
        AuthorisationResponse::DirectPost { to } => to.state.clone(),
        AuthorisationResponse::DirectPostJwt { state, .. } => Some(state.clone()),
    }
    .ok_or(Error::MissingState)?;
    let request_id = RequestId::from_raw(state);

    // 2. Load and gate.
    debug!(%request_id, "post_wallet_response: loading presentation by request_id");
    let presentation = store
        .load_by_request_id(&request_id)?
        .ok_or(Error::PresentationDefinitionNotFound)?;
    let now = Utc::now();
    let presentation = presentation.sweep_timeout(now, config.max_age);
    let meta = match &presentation {
        Presentation::RequestObjectRetrieved { meta, .. } => meta.clone(),
        Presentation::TimedOut { .. } => return Err(Error::Expired),
        Presentation::Requested(_) | Presentation::Submitted { .. } => {
            return Err(Error::PresentationNotInExpectedState)
        }
    };

    // 3. Response-mode match.
    let actual = response.transport_name();
    let expected = response_mode_name(meta.response_mode);
    if actual != expected {
        warn!(
            transaction_id = %meta.id,
            expected,
            actual,
            "wallet response rejected: unexpected response mode"
        );
        return Err(Error::UnexpectedResponseMode { expected, actual });
    }

    // 4. Unwrap JARM (DirectPostJwt only).
    let to = match &response {
        AuthorisationResponse::DirectPost { to } => to.clone(),
        AuthorisationResponse::DirectPostJwt { state: outer_state, jarm } => {
            let jarm_option = config.jarm_option()?;
            let ephemeral_key = meta.ephemeral_ec_private_key.as_ref().ok_or_else(|| {
                Error::ServerError(
                    "DirectPostJwt presentation is missing its ephemeral key".to_string(),
                )
            })?;
            let bytes = unwrap_jarm(jarm, jarm_option, ephemeral_key.secret(), None)?;
            let inner: AuthorisationResponseTo = serde_json::from_slice(&bytes)
                .map_err(|_| Error::InvalidJarm("invalid JARM payload".to_string()))?;
            let inner_state = inner.state.as_deref().ok_or(Error::MissingState)?;
            if inner_state != outer_state {
                warn!(
                    transaction_id = %meta.id,
                    "wallet response rejected: JARM inner state does not match outer state"
                );
                return Err(Error::IncorrectStateInJarm);
            }
            inner
        }
    };

    // 5. Classify the payload.
    if let Some(code) = to.error.clone() {
        let wallet_response = WalletResponse::Error {
            code,
            description: to.error_description.clone(),
        };
        return finalize(store, presentation, &meta, wallet_response, now);
    }

    let id_token = match &meta.presentation_type {
        PresentationType::IdTokenRequest { .. } | PresentationType::IdAndVpToken { .. } => {
            Some(to.id_token.clone().ok_or(Error::MissingIdToken)?)
        }
        PresentationType::VpTokenRequest { .. } => None,
    };
    let vp_data = match &meta.presentation_type {
        PresentationType::VpTokenRequest { presentation_definition }
        | PresentationType::IdAndVpToken { presentation_definition, .. } => {
            let vp_token = to
                .vp_token
                .clone()
                .ok_or(Error::MissingVpTokenOrPresentationSubmission)?;
            let presentation_submission = to
                .presentation_submission
                .clone()
                .ok_or(Error::MissingVpTokenOrPresentationSubmission)?;
            Some((vp_token, presentation_submission, presentation_definition))
        }
        PresentationType::IdTokenRequest { .. } => None,
    };

    // 6. Cryptographic verification of each VP.
    if let Some((vp_token, presentation_submission, presentation_definition)) = &vp_data {
        verify_presentation_submission(
            config,
            provider,
            &meta,
            presentation_definition,
            vp_token,
            presentation_submission,
            now,
        )
        .await?;
    }

    // 7. Assemble.
    let wallet_response = match (id_token, vp_data) {
        (Some(id_token), None) => WalletResponse::IdToken { id_token },
        (None, Some((vp_token, presentation_submission, _))) => WalletResponse::VpToken {
            vp_token,
            presentation_submission,
        },
        (Some(id_token), Some((vp_token, presentation_submission, _))) => {
            WalletResponse::IdAndVpToken {
                id_token,
                vp_token,
                presentation_submission,
            }
        }
        (None, None) => {
            return Err(Error::ServerError(
                "presentation type required neither an id_token nor a vp_token".to_string(),
            ))
        }
    };

    // 8-10. Allocate ResponseCode, transition, and return.
    finalize(store, presentation, &meta, wallet_response, now)
}

const fn response_mode_name(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::DirectPost => "direct_post",
        ResponseMode::DirectPostJwt => "direct_post.jwt",
    }
}

fn finalize(
    store: &impl PresentationStore,
    presentation: Presentation,
    meta: &PresentationMeta,
    wallet_response: WalletResponse,
    now: DateTime<Utc>,
) -> Result<PostWalletResponseResponse, Error> {
    let response_code = match &meta.get_wallet_response_method {
        GetWalletResponseMethod::Redirect { .. } => Some(generate::response_code()),
        GetWalletResponseMethod::Poll => None,
    };
    let redirect_uri = match (&meta.get_wallet_response_method, &response_code) {
        (GetWalletResponseMethod::Redirect { uri_template }, Some(code)) => {
            Some(uri_template.replacen("{}", code.as_str(), 1))
        }
        _ => None,
    };

    let presentation = presentation.submit(wallet_response, response_code, now)?;
    store.store(presentation)?;
    Ok(PostWalletResponseResponse { redirect_uri })
}

/// Extract each descriptor's sub-token from `vp_token` and cryptographically
/// verify it, dispatching by `descriptor.format` (§4.4 step 6).
async fn verify_presentation_submission(
    config: &VerifierConfig,
    provider: &impl Provider,
    meta: &PresentationMeta,
    definition: &PresentationDefinition,
    vp_token: &Value,
    submission: &PresentationSubmission,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    for descriptor in &submission.descriptor_map {
        debug!(descriptor_id = %descriptor.id, format = %descriptor.format, "verifying descriptor sub-token");
        let sub_token = extract_descriptor_token(vp_token, &descriptor.path)?;
        let input_descriptor = definition
            .input_descriptors
            .iter()
            .find(|d| d.id == descriptor.id);

        match descriptor.format.as_str() {
            "vc+sd-jwt" => {
                let issuer_key = provider.issuer_verifying_key(None).await?;
                let audience = client_id(config);
                let claims = sd_jwt::verify(&sub_token, &issuer_key, &meta.nonce, &audience)?;
                if let Some(input_descriptor) = input_descriptor {
                    if !input_descriptor.constraints.satisfied(&claims)? {
                        warn!(descriptor_id = %descriptor.id, "descriptor rejected: constraints not satisfied");
                        return Err(Error::InvalidSDJwt(
                            "presented claims do not satisfy the input descriptor's constraints"
                                .to_string(),
                        ));
                    }
                }
            }
            "mso_mdoc" => {
                let issuer_key = provider.issuer_verifying_key(None).await?;
                // Input-descriptor ids name the ISO 18013-5 document type
                // they request (e.g. `org.iso.18013.5.1.mDL`).
                mdoc::verify(&sub_token, &issuer_key, &descriptor.id, now)?;
            }
            "vc+sd-jwt+zkp" => {
                let key = meta.zkp_keys.as_ref().and_then(|keys| keys.get(&descriptor.id)).ok_or_else(|| {
                    Error::InvalidVPToken(format!(
                        "no ZKP key registered for descriptor {}",
                        descriptor.id
                    ))
                })?;
                zkp::verify_sd_jwt_zkp(provider, key, &sub_token, &meta.nonce).await?;
            }
            "mso_mdoc+zkp" => {
                let key = meta.zkp_keys.as_ref().and_then(|keys| keys.get(&descriptor.id)).ok_or_else(|| {
                    Error::InvalidVPToken(format!(
                        "no ZKP key registered for descriptor {}",
                        descriptor.id
                    ))
                })?;
                zkp::verify_mdoc_zkp(provider, key, &sub_token, &meta.nonce).await?;
            }
            other => return Err(Error::InvalidFormat(other.to_string())),
        }
    }
    Ok(())
}

fn extract_descriptor_token(vp_token: &Value, path: &str) -> Result<String, Error> {
    let jpath = JsonPath::parse(path)
        .map_err(|_| Error::MissingVpTokenOrPresentationSubmission)?;
    let nodes = jpath.query(vp_token).all();
    nodes
        .first()
        .and_then(|node| node.as_str())
        .map(str::to_string)
        .ok_or(Error::MissingVpTokenOrPresentationSubmission)
}
