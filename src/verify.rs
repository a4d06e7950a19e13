//! Cryptographic verification of each Verifiable Presentation format this
//! Verifier accepts (§4.4 step 6): SD-JWT, mdoc/CBOR, and their
//! Zero-Knowledge-Proof-wrapped variants.

pub mod mdoc;
pub mod sd_jwt;
pub mod zkp;
