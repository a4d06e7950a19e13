//! End-to-end lifecycle scenarios, one per §8 "End-to-end scenarios" case:
//! a Wallet and an Issuer are simulated directly against this crate's
//! public API (`usecases`, `store`, `provider`) against an in-memory
//! store and a deterministic test `Provider`.

use std::collections::HashMap;
use std::future::Future;

use aes::Aes128;
use base64ct::{Base64UrlUnpadded, Encoding};
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use chrono::{Duration, Utc};
use ciborium::Value as Cbor;
use coset::{AsCborValue, CoseSign1Builder, HeaderBuilder};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use oid4vp_verifier::config::VerifierConfig;
use oid4vp_verifier::domain::{
    AuthorisationResponse, AuthorisationResponseTo, Constraints, DescriptorMap, EmbedMode, Field,
    Filter, FilterValue, GetWalletResponseMethod, PresentationDefinition, PresentationSubmission,
    ResponseMode,
};
use oid4vp_verifier::jose::jwk::PublicKeyJwk;
use oid4vp_verifier::jose::jws::JwsAlgorithm;
use oid4vp_verifier::provider::{IssuerKeyStore, ZkpFormat, ZkpVerifier};
use oid4vp_verifier::store::InMemoryPresentationStore;
use oid4vp_verifier::usecases::{
    get_request_object, get_wallet_response, init_transaction, post_wallet_response,
    InitTransactionRequest, InitTransactionType,
};
use oid4vp_verifier::{Error, Presentation, PresentationStore};
use p256::ecdh::diffie_hellman;
use p256::ecdsa::signature::{SignatureEncoding as _, Signer as _};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{PublicKey, SecretKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

struct TestProvider {
    jar_key: SigningKey,
    issuer_key: SigningKey,
    zkp_accept: bool,
}

impl TestProvider {
    fn new() -> Self {
        Self {
            jar_key: SigningKey::random(&mut rand_core::OsRng),
            issuer_key: SigningKey::random(&mut rand_core::OsRng),
            zkp_accept: true,
        }
    }
}

impl oid4vp_verifier::jose::jws::Signer for TestProvider {
    fn algorithm(&self) -> JwsAlgorithm {
        JwsAlgorithm::Es256
    }

    fn verifying_jwk(&self) -> PublicKeyJwk {
        PublicKeyJwk::from_public_key(&PublicKey::from(VerifyingKey::from(&self.jar_key)))
    }

    async fn try_sign(&self, msg: Vec<u8>) -> Result<Vec<u8>, Error> {
        let sig: Signature = self.jar_key.sign(&msg);
        Ok(sig.to_vec())
    }
}

impl IssuerKeyStore for TestProvider {
    fn issuer_verifying_key(
        &self,
        _key_id: Option<&str>,
    ) -> impl Future<Output = Result<VerifyingKey, Error>> + Send {
        async move { Ok(VerifyingKey::from(&self.issuer_key)) }
    }
}

impl ZkpVerifier for TestProvider {
    fn verify_challenge(
        &self,
        _key: &PublicKeyJwk,
        _format: ZkpFormat,
        _token: &[u8],
        _nonce: &str,
    ) -> impl Future<Output = Result<bool, Error>> + Send {
        let accept = self.zkp_accept;
        async move { Ok(accept) }
    }
}

fn config(response_mode: ResponseMode) -> VerifierConfig {
    VerifierConfig {
        client_id: "verifier.example".to_string(),
        client_id_scheme: "redirect_uri".to_string(),
        jar_signing_algorithm: JwsAlgorithm::Es256,
        default_response_mode: response_mode,
        jarm_signed_response_alg: None,
        jarm_encrypted_response_alg: Some("ECDH-ES".to_string()),
        jarm_encrypted_response_enc: Some("A128CBC-HS256".to_string()),
        max_age: Duration::minutes(10),
        public_url: "https://verifier.example".to_string(),
        request_jwt_embed: EmbedMode::ByValue,
        presentation_definition_embed: EmbedMode::ByValue,
        issuer_cert: "-----BEGIN PUBLIC KEY-----".to_string(),
    }
}

fn employment_definition() -> PresentationDefinition {
    PresentationDefinition {
        id: "employment-pd".to_string(),
        purpose: Some("To verify employment".to_string()),
        input_descriptors: vec![oid4vp_verifier::domain::InputDescriptor {
            id: "employment".to_string(),
            name: None,
            constraints: Constraints {
                fields: Some(vec![Field {
                    path: vec!["$.type".to_string()],
                    optional: None,
                    filter: Some(Filter {
                        type_: "string".to_string(),
                        value: FilterValue::Const("EmployeeIDCredential".to_string()),
                    }),
                }]),
            },
        }],
    }
}

fn sign_jws(key: &SigningKey, claims: &Value, typ: &str) -> String {
    let header = json!({ "alg": "ES256", "typ": typ });
    let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header).unwrap());
    let payload_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims).unwrap());
    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig: Signature = key.sign(signing_input.as_bytes());
    format!(
        "{signing_input}.{}",
        Base64UrlUnpadded::encode_string(&sig.to_vec())
    )
}

fn holder_jwk(key: &SigningKey) -> PublicKeyJwk {
    PublicKeyJwk::from_public_key(&PublicKey::from(VerifyingKey::from(key)))
}

/// Build a valid `vc+sd-jwt` presentation: one disclosed `type` claim plus
/// a Key-Binding JWT bound to `nonce`/`audience`.
fn sd_jwt_presentation(
    issuer_key: &SigningKey,
    holder_key: &SigningKey,
    nonce: &str,
    audience: &str,
) -> String {
    let disclosure = Base64UrlUnpadded::encode_string(
        &serde_json::to_vec(&json!(["salt", "type", "EmployeeIDCredential"])).unwrap(),
    );
    let digest = Base64UrlUnpadded::encode_string(&Sha256::digest(disclosure.as_bytes()));

    let issuer_claims = json!({
        "iss": "https://issuer.example",
        "vct": "https://credentials.example/employee-id",
        "_sd": [digest],
        "_sd_alg": "sha-256",
        "cnf": { "jwk": holder_jwk(holder_key) },
    });
    let issuer_jwt = sign_jws(issuer_key, &issuer_claims, "dc+sd-jwt");
    let signed_part = format!("{issuer_jwt}~{disclosure}~");
    let sd_hash = Base64UrlUnpadded::encode_string(&Sha256::digest(signed_part.as_bytes()));

    let kb_claims = json!({
        "nonce": nonce,
        "aud": audience,
        "iat": 1_700_000_000,
        "sd_hash": sd_hash,
    });
    let kb_jwt = sign_jws(holder_key, &kb_claims, "kb+jwt");
    format!("{signed_part}{kb_jwt}")
}

fn employment_submission(format: &str) -> PresentationSubmission {
    PresentationSubmission {
        id: "submission-1".to_string(),
        definition_id: "employment-pd".to_string(),
        descriptor_map: vec![DescriptorMap {
            id: "employment".to_string(),
            format: format.to_string(),
            path: "$".to_string(),
            path_nested: None,
        }],
    }
}

/// Mirrors `verify::mdoc`'s test fixtures: a one-document `mso_mdoc` token
/// whose Issuer signature and validity period both check out.
fn mdoc_token(doc_type: &str, issuer_key: &SigningKey, now: chrono::DateTime<Utc>) -> String {
    let mso = Cbor::Map(vec![
        (Cbor::Text("docType".to_string()), Cbor::Text(doc_type.to_string())),
        (
            Cbor::Text("validityInfo".to_string()),
            Cbor::Map(vec![
                (
                    Cbor::Text("validFrom".to_string()),
                    Cbor::Text((now - Duration::hours(1)).to_rfc3339()),
                ),
                (
                    Cbor::Text("validUntil".to_string()),
                    Cbor::Text((now + Duration::days(1)).to_rfc3339()),
                ),
            ]),
        ),
    ]);
    let mut mso_bytes = Vec::new();
    ciborium::ser::into_writer(&mso, &mut mso_bytes).unwrap();

    let protected = HeaderBuilder::new().algorithm(coset::iana::Algorithm::ES256).build();
    let sign1 = CoseSign1Builder::new()
        .protected(protected)
        .payload(mso_bytes)
        .create_signature(&[], |tbs| {
            let sig: Signature = issuer_key.sign(tbs);
            sig.to_vec()
        })
        .build();

    let document = Cbor::Map(vec![
        (Cbor::Text("docType".to_string()), Cbor::Text(doc_type.to_string())),
        (
            Cbor::Text("issuerSigned".to_string()),
            Cbor::Map(vec![(
                Cbor::Text("issuerAuth".to_string()),
                sign1.to_cbor_value().unwrap(),
            )]),
        ),
    ]);
    let top = Cbor::Map(vec![(
        Cbor::Text("documents".to_string()),
        Cbor::Array(vec![document]),
    )]);
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&top, &mut buf).unwrap();
    Base64UrlUnpadded::encode_string(&buf)
}

/// The Wallet side of JARM: ECDH-ES key agreement against the Verifier's
/// published ephemeral public key, then A128CBC-HS256 content encryption.
/// Inverse of `jose::jwe::decrypt_jwe`, reimplemented here since that
/// function is private to the library crate.
fn encrypt_jarm(payload: &[u8], verifier_public: &PublicKey) -> String {
    let wallet_ephemeral = SecretKey::random(&mut rand_core::OsRng);
    let wallet_public = wallet_ephemeral.public_key();
    let epk = PublicKeyJwk::from_public_key(&wallet_public);

    let header = json!({
        "alg": "ECDH-ES",
        "enc": "A128CBC-HS256",
        "epk": epk,
    });
    let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header).unwrap());

    let shared_secret =
        diffie_hellman(wallet_ephemeral.to_nonzero_scalar(), verifier_public.as_affine());
    let mut other_info = Vec::new();
    other_info.extend_from_slice(&(b"A128CBC-HS256".len() as u32).to_be_bytes());
    other_info.extend_from_slice(b"A128CBC-HS256");
    other_info.extend_from_slice(&0u32.to_be_bytes());
    other_info.extend_from_slice(&0u32.to_be_bytes());
    other_info.extend_from_slice(&256u32.to_be_bytes());
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret.raw_secret_bytes());
    let mut derived = vec![0u8; 32];
    hkdf.expand(&other_info, &mut derived).unwrap();
    let (mac_key, enc_key) = derived.split_at(16);

    let iv: [u8; 16] = rand::random();
    let encryptor = Aes128CbcEnc::new_from_slices(enc_key, &iv).unwrap();
    let ciphertext = encryptor.encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(payload);

    let aad = header_b64.as_bytes();
    let al = ((aad.len() as u64) * 8).to_be_bytes();
    let mut mac_input = Vec::new();
    mac_input.extend_from_slice(aad);
    mac_input.extend_from_slice(&iv);
    mac_input.extend_from_slice(&ciphertext);
    mac_input.extend_from_slice(&al);
    let mut mac = HmacSha256::new_from_slice(mac_key).unwrap();
    mac.update(&mac_input);
    let tag = &mac.finalize().into_bytes()[..16];

    format!(
        "{header_b64}..{}.{}.{}",
        Base64UrlUnpadded::encode_string(&iv),
        Base64UrlUnpadded::encode_string(&ciphertext),
        Base64UrlUnpadded::encode_string(tag),
    )
}

async fn init_and_fetch(
    config: &VerifierConfig,
    store: &InMemoryPresentationStore,
    provider: &TestProvider,
    request: InitTransactionRequest,
) -> (oid4vp_verifier::domain::TransactionId, String, String) {
    let response = init_transaction(config, store, request).await.unwrap();
    let requested = store
        .load_by_transaction_id(&response.transaction_id)
        .unwrap()
        .unwrap();
    let Presentation::Requested(meta) = requested else {
        panic!("expected Requested");
    };
    let request_id = meta.request_id.clone();
    let jar = get_request_object(config, store, provider, &request_id)
        .await
        .unwrap();
    (response.transaction_id, request_id.as_str().to_string(), jar)
}

#[tokio::test]
async fn happy_path_vp_redirect() {
    let store = InMemoryPresentationStore::new();
    let provider = TestProvider::new();
    let config = config(ResponseMode::DirectPost);

    let (transaction_id, request_id, _jar) = init_and_fetch(
        &config,
        &store,
        &provider,
        InitTransactionRequest {
            presentation_type: InitTransactionType::VpToken {
                presentation_definition: employment_definition(),
            },
            response_mode: Some(ResponseMode::DirectPost),
            get_wallet_response_method: GetWalletResponseMethod::Redirect {
                uri_template: "/cb?code={}".to_string(),
            },
            zkp_keys: None,
        },
    )
    .await;

    let retrieved = store
        .load_by_transaction_id(&transaction_id)
        .unwrap()
        .unwrap();
    let Presentation::RequestObjectRetrieved { meta, .. } = retrieved else {
        panic!("expected RequestObjectRetrieved");
    };
    let holder_key = SigningKey::random(&mut rand_core::OsRng);
    let client_id = format!("{}:{}", config.client_id_scheme, config.client_id);
    let vp = sd_jwt_presentation(&provider.issuer_key, &holder_key, &meta.nonce, &client_id);

    let response_body = AuthorisationResponseTo {
        state: Some(request_id.clone()),
        vp_token: Some(json!(vp)),
        presentation_submission: Some(employment_submission("vc+sd-jwt")),
        ..Default::default()
    };
    let result = post_wallet_response(
        &config,
        &store,
        &provider,
        AuthorisationResponse::DirectPost { to: response_body },
    )
    .await
    .unwrap();

    let redirect_uri = result.redirect_uri.expect("redirect mode returns a uri");
    assert!(redirect_uri.starts_with("/cb?code="));
    let code = redirect_uri.trim_start_matches("/cb?code=");
    let response_code = oid4vp_verifier::domain::ResponseCode::from_raw(code.to_string());

    let wallet_response =
        get_wallet_response(&store, &transaction_id, Some(&response_code)).unwrap();
    assert!(matches!(
        wallet_response,
        oid4vp_verifier::domain::WalletResponse::VpToken { .. }
    ));

    let second = get_wallet_response(&store, &transaction_id, Some(&response_code));
    assert!(matches!(
        second.unwrap_err(),
        Error::PresentationDefinitionNotFound
    ));
}

#[tokio::test]
async fn mode_mismatch_is_rejected() {
    let store = InMemoryPresentationStore::new();
    let provider = TestProvider::new();
    let config = config(ResponseMode::DirectPost);

    let (_transaction_id, request_id, _jar) = init_and_fetch(
        &config,
        &store,
        &provider,
        InitTransactionRequest {
            presentation_type: InitTransactionType::IdToken {
                id_token_type: oid4vp_verifier::domain::IdTokenType::SubjectSigned,
            },
            response_mode: Some(ResponseMode::DirectPost),
            get_wallet_response_method: GetWalletResponseMethod::Poll,
            zkp_keys: None,
        },
    )
    .await;

    let err = post_wallet_response(
        &config,
        &store,
        &provider,
        AuthorisationResponse::DirectPostJwt {
            state: request_id,
            jarm: "not-used".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        Error::UnexpectedResponseMode {
            expected: "direct_post",
            actual: "direct_post.jwt",
        }
    ));
}

#[tokio::test]
async fn jarm_state_tamper_is_rejected() {
    let store = InMemoryPresentationStore::new();
    let provider = TestProvider::new();
    let config = config(ResponseMode::DirectPostJwt);

    let (transaction_id, request_id, _jar) = init_and_fetch(
        &config,
        &store,
        &provider,
        InitTransactionRequest {
            presentation_type: InitTransactionType::IdToken {
                id_token_type: oid4vp_verifier::domain::IdTokenType::SubjectSigned,
            },
            response_mode: Some(ResponseMode::DirectPostJwt),
            get_wallet_response_method: GetWalletResponseMethod::Poll,
            zkp_keys: None,
        },
    )
    .await;

    let retrieved = store
        .load_by_transaction_id(&transaction_id)
        .unwrap()
        .unwrap();
    let Presentation::RequestObjectRetrieved { meta, .. } = retrieved else {
        panic!("expected RequestObjectRetrieved");
    };
    let verifier_public = meta.ephemeral_ec_private_key.unwrap().public_jwk().to_public_key().unwrap();

    let inner = json!({ "state": "a-different-state", "id_token": "jwt" });
    let jarm = encrypt_jarm(&serde_json::to_vec(&inner).unwrap(), &verifier_public);

    let err = post_wallet_response(
        &config,
        &store,
        &provider,
        AuthorisationResponse::DirectPostJwt {
            state: request_id,
            jarm,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::IncorrectStateInJarm));

    let stored = store.load_by_transaction_id(&transaction_id).unwrap().unwrap();
    assert!(matches!(stored, Presentation::RequestObjectRetrieved { .. }));
}

#[tokio::test]
async fn zkp_challenge_failure_is_rejected() {
    let store = InMemoryPresentationStore::new();
    let mut provider = TestProvider::new();
    provider.zkp_accept = false;
    let config = config(ResponseMode::DirectPost);

    let mut zkp_keys = HashMap::new();
    let zkp_key_holder = SigningKey::random(&mut rand_core::OsRng);
    zkp_keys.insert("employment".to_string(), holder_jwk(&zkp_key_holder));

    let (_transaction_id, request_id, _jar) = init_and_fetch(
        &config,
        &store,
        &provider,
        InitTransactionRequest {
            presentation_type: InitTransactionType::VpToken {
                presentation_definition: employment_definition(),
            },
            response_mode: Some(ResponseMode::DirectPost),
            get_wallet_response_method: GetWalletResponseMethod::Poll,
            zkp_keys: Some(zkp_keys),
        },
    )
    .await;

    let retrieved = store
        .load_by_request_id(&oid4vp_verifier::domain::RequestId::from_raw(request_id.clone()))
        .unwrap()
        .unwrap();
    let Presentation::RequestObjectRetrieved { meta, .. } = retrieved else {
        panic!("expected RequestObjectRetrieved");
    };
    let holder_key = SigningKey::random(&mut rand_core::OsRng);
    let client_id = format!("{}:{}", config.client_id_scheme, config.client_id);
    let vp = sd_jwt_presentation(&provider.issuer_key, &holder_key, &meta.nonce, &client_id);

    let response_body = AuthorisationResponseTo {
        state: Some(request_id),
        vp_token: Some(json!(vp)),
        presentation_submission: Some(employment_submission("vc+sd-jwt+zkp")),
        ..Default::default()
    };
    let err = post_wallet_response(
        &config,
        &store,
        &provider,
        AuthorisationResponse::DirectPost { to: response_body },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidVPToken(_)));
}

#[tokio::test]
async fn mdoc_happy_path() {
    let store = InMemoryPresentationStore::new();
    let provider = TestProvider::new();
    let config = config(ResponseMode::DirectPost);

    let mut definition = employment_definition();
    definition.input_descriptors[0].id = "org.iso.18013.5.1.mDL".to_string();

    let (_transaction_id, request_id, _jar) = init_and_fetch(
        &config,
        &store,
        &provider,
        InitTransactionRequest {
            presentation_type: InitTransactionType::VpToken {
                presentation_definition: definition,
            },
            response_mode: Some(ResponseMode::DirectPost),
            get_wallet_response_method: GetWalletResponseMethod::Poll,
            zkp_keys: None,
        },
    )
    .await;

    let token = mdoc_token("org.iso.18013.5.1.mDL", &provider.issuer_key, Utc::now());
    let mut submission = employment_submission("mso_mdoc");
    submission.descriptor_map[0].id = "org.iso.18013.5.1.mDL".to_string();

    let response_body = AuthorisationResponseTo {
        state: Some(request_id),
        vp_token: Some(json!(token)),
        presentation_submission: Some(submission),
        ..Default::default()
    };
    post_wallet_response(
        &config,
        &store,
        &provider,
        AuthorisationResponse::DirectPost { to: response_body },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn timeout_rejects_a_late_fetch() {
    let store = InMemoryPresentationStore::new();
    let provider = TestProvider::new();
    let mut config = config(ResponseMode::DirectPost);
    config.max_age = Duration::seconds(0);

    let response = init_transaction(
        &config,
        &store,
        InitTransactionRequest {
            presentation_type: InitTransactionType::IdToken {
                id_token_type: oid4vp_verifier::domain::IdTokenType::SubjectSigned,
            },
            response_mode: Some(ResponseMode::DirectPost),
            get_wallet_response_method: GetWalletResponseMethod::Poll,
            zkp_keys: None,
        },
    )
    .await
    .unwrap();
    let requested = store
        .load_by_transaction_id(&response.transaction_id)
        .unwrap()
        .unwrap();
    let Presentation::Requested(meta) = requested else {
        panic!("expected Requested");
    };

    std::thread::sleep(std::time::Duration::from_millis(10));
    let err = get_request_object(&config, &store, &provider, &meta.request_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Expired));

    let stored = store
        .load_by_transaction_id(&response.transaction_id)
        .unwrap()
        .unwrap();
    assert!(matches!(stored, Presentation::TimedOut { .. }));
}
