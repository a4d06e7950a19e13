//! `mso_mdoc` (ISO 18013-5) verification (§4.4 step 6): each document in
//! the token's `documents` list must carry a valid Issuer COSE_Sign1
//! signature over its Mobile Security Object, an unexpired validity
//! period, and the expected document type.
//!
//! Uses the same COSE_Sign1 builder/verifier shape as
//! `oid4vp/iso_18013_7/prepare_response.rs` elsewhere in this ecosystem
//! (there used to build a `DeviceAuth`, here used in reverse to verify
//! an `IssuerAuth`), backed directly by `coset` rather than `isomdl`
//! since this crate only needs to check a signature, not render a
//! credential for display.

use chrono::{DateTime, Utc};
use ciborium::Value as Cbor;
use coset::{AsCborValue, CoseSign1};
use p256::ecdsa::{signature::Verifier as _, Signature, VerifyingKey};

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::Error;

/// Verify a base64url-encoded `mso_mdoc` VP token.
///
/// # Errors
///
/// Returns `Error::InvalidMdoc` for any structural or cryptographic
/// failure: invalid encoding, an empty or malformed `documents` list, an
/// Issuer signature that doesn't verify, an expired or not-yet-valid
/// Mobile Security Object, or a document type that doesn't match
/// `expected_doc_type`.
pub fn verify(
    token: &str,
    issuer_key: &VerifyingKey,
    expected_doc_type: &str,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let bytes = Base64UrlUnpadded::decode_vec(token)
        .map_err(|_| Error::InvalidMdoc("invalid base64url encoding".to_string()))?;
    let top: Cbor = ciborium::de::from_reader(bytes.as_slice())
        .map_err(|_| Error::InvalidMdoc("invalid top-level CBOR".to_string()))?;
    let documents = map_get(&top, "documents")
        .and_then(Cbor::as_array)
        .ok_or_else(|| Error::InvalidMdoc("missing documents list".to_string()))?;
    if documents.is_empty() {
        return Err(Error::InvalidMdoc("documents list is empty".to_string()));
    }
    for document in documents {
        verify_document(document, issuer_key, expected_doc_type, now)?;
    }
    Ok(())
}

fn verify_document(
    document: &Cbor,
    issuer_key: &VerifyingKey,
    expected_doc_type: &str,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let doc_type = map_get(document, "docType")
        .and_then(Cbor::as_text)
        .ok_or_else(|| Error::InvalidMdoc("missing docType".to_string()))?;
    if doc_type != expected_doc_type {
        return Err(Error::InvalidMdoc(format!(
            "unexpected document type: {doc_type}"
        )));
    }

    let issuer_signed = map_get(document, "issuerSigned")
        .ok_or_else(|| Error::InvalidMdoc("missing issuerSigned".to_string()))?;
    let issuer_auth = map_get(issuer_signed, "issuerAuth")
        .ok_or_else(|| Error::InvalidMdoc("missing issuerAuth".to_string()))?;
    let cose_sign1 = CoseSign1::from_cbor_value(issuer_auth.clone())
        .map_err(|_| Error::InvalidMdoc("malformed issuerAuth COSE_Sign1".to_string()))?;

    cose_sign1.verify_signature(&[], |signature_bytes, signed_data| {
        let signature = Signature::try_from(signature_bytes)
            .map_err(|_| Error::InvalidMdoc("malformed issuer signature".to_string()))?;
        issuer_key
            .verify(signed_data, &signature)
            .map_err(|_| Error::InvalidMdoc("issuer signature verification failed".to_string()))
    })?;

    let payload = cose_sign1
        .payload
        .as_ref()
        .ok_or_else(|| Error::InvalidMdoc("issuerAuth carries no MSO payload".to_string()))?;
    let mso: Cbor = ciborium::de::from_reader(payload.as_slice())
        .map_err(|_| Error::InvalidMdoc("invalid Mobile Security Object".to_string()))?;

    let mso_doc_type = map_get(&mso, "docType")
        .and_then(Cbor::as_text)
        .ok_or_else(|| Error::InvalidMdoc("MSO missing docType".to_string()))?;
    if mso_doc_type != expected_doc_type {
        return Err(Error::InvalidMdoc(
            "MSO docType does not match document".to_string(),
        ));
    }

    let validity = map_get(&mso, "validityInfo")
        .ok_or_else(|| Error::InvalidMdoc("MSO missing validityInfo".to_string()))?;
    let valid_from = parse_tdate(validity, "validFrom")?;
    let valid_until = parse_tdate(validity, "validUntil")?;
    if now < valid_from || now > valid_until {
        return Err(Error::InvalidMdoc(
            "MSO is outside its validity period".to_string(),
        ));
    }

    Ok(())
}

fn map_get<'a>(value: &'a Cbor, key: &str) -> Option<&'a Cbor> {
    value
        .as_map()?
        .iter()
        .find_map(|(k, v)| (k.as_text() == Some(key)).then_some(v))
}

fn parse_tdate(value: &Cbor, key: &str) -> Result<DateTime<Utc>, Error> {
    let raw = map_get(value, key)
        .and_then(Cbor::as_text)
        .ok_or_else(|| Error::InvalidMdoc(format!("MSO missing {key}")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidMdoc(format!("invalid {key} timestamp")))
}
