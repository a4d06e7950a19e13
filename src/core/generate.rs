//! Generation of opaque, unguessable identifiers.
//!
//! `TransactionId`, `RequestId`, `ResponseCode`, and the presentation
//! `nonce` are all generated the same way: enough random entropy that an
//! adversary cannot feasibly guess a valid value. [`uuid`] v4 is used for
//! ids that should also be convenient to log and compare; the nonce and
//! `ResponseCode` use a raw random byte string instead, since they are
//! never looked up by prefix and benefit from shorter, URL-safe encoding.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::domain::{RequestId, ResponseCode, TransactionId};

/// Generate a fresh, cryptographically random `TransactionId`.
#[must_use]
pub fn transaction_id() -> TransactionId {
    TransactionId(Uuid::new_v4().to_string())
}

/// Generate a fresh, cryptographically random `RequestId` (used as the
/// OAuth `state` parameter between Verifier and Wallet).
#[must_use]
pub fn request_id() -> RequestId {
    RequestId(Uuid::new_v4().to_string())
}

/// Generate a fresh, cryptographically random `ResponseCode`.
#[must_use]
pub fn response_code() -> ResponseCode {
    ResponseCode(random_token(16))
}

/// Generate a fresh presentation `nonce`, bound into the Request Object and
/// echoed back in each Verifiable Presentation's proof.
#[must_use]
pub fn nonce() -> String {
    random_token(16)
}

/// Base64url-encode `len` bytes of OS randomness.
fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}
