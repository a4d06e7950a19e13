//! `vc+sd-jwt` verification (§4.4 step 6): Issuer signature, selective
//! disclosure digests, and a mandatory Key-Binding JWT.
//!
//! Claim shapes (`SdJwtClaims`, `Disclosure`, `KbJwtClaims`) worked
//! backwards from issuance into verification.

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::VerifyingKey;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::jose::jwk::PublicKeyJwk;
use crate::jose::jws::verify_es256_compact;
use crate::Error;

/// Verify an SD-JWT presentation of the form
/// `<Issuer-signed JWT>~<Disclosure>~...~<Key-Binding JWT>` and return its
/// claims with every disclosed selective-disclosure claim expanded back
/// into the object it was concealed from, ready for
/// `Constraints::satisfied`.
///
/// # Errors
///
/// Returns `Error::InvalidSDJwt` for any structural or cryptographic
/// failure: a malformed presentation, a missing or invalid Key-Binding
/// JWT, an Issuer signature that doesn't verify, a disclosure not
/// referenced by `_sd`, or a Key-Binding `nonce`/`aud`/`sd_hash` mismatch.
pub fn verify(
    presentation: &str,
    issuer_key: &VerifyingKey,
    nonce: &str,
    audience: &str,
) -> Result<Value, Error> {
    let mut parts: Vec<&str> = presentation.split('~').collect();
    if parts.len() < 2 {
        return Err(Error::InvalidSDJwt(
            "malformed SD-JWT presentation".to_string(),
        ));
    }
    let kb_jwt = parts
        .pop()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidSDJwt("key-binding JWT is required".to_string()))?;
    let issuer_jwt = parts[0];
    let disclosures = &parts[1..];

    let payload_bytes = verify_es256_compact(issuer_jwt, issuer_key)
        .map_err(|_| Error::InvalidSDJwt("issuer signature verification failed".to_string()))?;
    let mut claims: Value = serde_json::from_slice(&payload_bytes)
        .map_err(|_| Error::InvalidSDJwt("invalid SD-JWT claims".to_string()))?;

    let sd_alg = claims
        .get("_sd_alg")
        .and_then(Value::as_str)
        .unwrap_or("sha-256")
        .to_string();
    if sd_alg != "sha-256" {
        return Err(Error::InvalidSDJwt(format!("unsupported _sd_alg: {sd_alg}")));
    }
    let declared_digests: Vec<String> = claims
        .get("_sd")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let object = claims
        .as_object_mut()
        .ok_or_else(|| Error::InvalidSDJwt("SD-JWT claims are not an object".to_string()))?;
    object.remove("_sd");
    object.remove("_sd_alg");
    let cnf_jwk = object
        .remove("cnf")
        .and_then(|cnf| cnf.get("jwk").cloned())
        .ok_or_else(|| Error::InvalidSDJwt("no confirmation key for key binding".to_string()))?;

    for disclosure in disclosures {
        let digest = Base64UrlUnpadded::encode_string(&Sha256::digest(disclosure.as_bytes()));
        if !declared_digests.contains(&digest) {
            return Err(Error::InvalidSDJwt(
                "disclosure not referenced by _sd".to_string(),
            ));
        }
        let decoded = Base64UrlUnpadded::decode_vec(disclosure)
            .map_err(|_| Error::InvalidSDJwt("invalid disclosure encoding".to_string()))?;
        let (_, name, value): (String, String, Value) = serde_json::from_slice(&decoded)
            .map_err(|_| Error::InvalidSDJwt("invalid disclosure shape".to_string()))?;
        object.insert(name, value);
    }

    let holder_jwk: PublicKeyJwk = serde_json::from_value(cnf_jwk)
        .map_err(|_| Error::InvalidSDJwt("invalid confirmation key".to_string()))?;
    let holder_key = holder_jwk
        .to_verifying_key()
        .map_err(|_| Error::InvalidSDJwt("invalid confirmation key".to_string()))?;

    let kb_payload_bytes = verify_es256_compact(kb_jwt, &holder_key).map_err(|_| {
        Error::InvalidSDJwt("key-binding signature verification failed".to_string())
    })?;
    let kb_claims: Value = serde_json::from_slice(&kb_payload_bytes)
        .map_err(|_| Error::InvalidSDJwt("invalid key-binding claims".to_string()))?;

    if kb_claims.get("nonce").and_then(Value::as_str) != Some(nonce) {
        return Err(Error::InvalidSDJwt("key-binding nonce mismatch".to_string()));
    }
    if kb_claims.get("aud").and_then(Value::as_str) != Some(audience) {
        return Err(Error::InvalidSDJwt(
            "key-binding audience mismatch".to_string(),
        ));
    }

    // The substring up to and including the trailing `~` before the
    // Key-Binding JWT: "<Issuer-signed JWT>~<Disclosure>~...~".
    let signed_part = &presentation[..presentation.len() - kb_jwt.len()];
    let expected_hash = Base64UrlUnpadded::encode_string(&Sha256::digest(signed_part.as_bytes()));
    if kb_claims.get("sd_hash").and_then(Value::as_str) != Some(expected_hash.as_str()) {
        return Err(Error::InvalidSDJwt("key-binding sd_hash mismatch".to_string()));
    }

    Ok(claims)
}

#[cfg(test)]
mod test {
    use p256::ecdsa::signature::{SignatureEncoding as _, Signer as _};
    use p256::ecdsa::{Signature, SigningKey};
    use p256::PublicKey;
    use serde_json::json;

    use super::*;

    fn sign(key: &SigningKey, claims: &Value, typ: &str) -> String {
        let header = json!({ "alg": "ES256", "typ": typ });
        let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header).unwrap());
        let payload_b64 =
            Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");
        let sig: Signature = key.sign(signing_input.as_bytes());
        let sig_b64 = Base64UrlUnpadded::encode_string(&sig.to_vec());
        format!("{signing_input}.{sig_b64}")
    }

    fn verifying_jwk(key: &SigningKey) -> PublicKeyJwk {
        let verifying_key = VerifyingKey::from(key);
        PublicKeyJwk::from_public_key(&PublicKey::from(verifying_key))
    }

    fn disclosure(name: &str, value: &Value) -> (String, String) {
        let encoded = Base64UrlUnpadded::encode_string(
            &serde_json::to_vec(&json!(["salt-123", name, value])).unwrap(),
        );
        let digest = Base64UrlUnpadded::encode_string(&Sha256::digest(encoded.as_bytes()));
        (encoded, digest)
    }

    #[test]
    fn full_presentation_round_trips() {
        let issuer_key = SigningKey::random(&mut rand_core::OsRng);
        let holder_key = SigningKey::random(&mut rand_core::OsRng);
        let holder_jwk = verifying_jwk(&holder_key);

        let (encoded_name, digest_name) = disclosure("given_name", &json!("Alice"));

        let issuer_claims = json!({
            "iss": "https://issuer.example",
            "vct": "https://credentials.example/id",
            "_sd": [digest_name],
            "_sd_alg": "sha-256",
            "cnf": { "jwk": holder_jwk },
        });
        let issuer_jwt = sign(&issuer_key, &issuer_claims, "dc+sd-jwt");
        let signed_part = format!("{issuer_jwt}~{encoded_name}~");
        let sd_hash = Base64UrlUnpadded::encode_string(&Sha256::digest(signed_part.as_bytes()));

        let kb_claims = json!({
            "nonce": "abc-nonce",
            "aud": "https://verifier.example",
            "iat": 1_700_000_000,
            "sd_hash": sd_hash,
        });
        let kb_jwt = sign(&holder_key, &kb_claims, "kb+jwt");

        let presentation = format!("{signed_part}{kb_jwt}");
        let issuer_verifying_key = VerifyingKey::from(&issuer_key);
        let verified = verify(
            &presentation,
            &issuer_verifying_key,
            "abc-nonce",
            "https://verifier.example",
        )
        .unwrap();
        assert_eq!(verified["given_name"], json!("Alice"));
    }

    #[test]
    fn missing_key_binding_jwt_is_rejected() {
        let issuer_key = SigningKey::random(&mut rand_core::OsRng);
        let claims = json!({ "iss": "https://issuer.example" });
        let issuer_jwt = sign(&issuer_key, &claims, "dc+sd-jwt");
        let issuer_verifying_key = VerifyingKey::from(&issuer_key);
        let err = verify(&issuer_jwt, &issuer_verifying_key, "n", "a").unwrap_err();
        assert!(matches!(err, Error::InvalidSDJwt(_)));
    }
}
