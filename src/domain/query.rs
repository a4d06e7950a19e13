//! [DIF Presentation Exchange] types: the Presentation Definition a
//! Verifier sends, and the Presentation Submission a Wallet returns
//! alongside its `vp_token`.
//!
//! [DIF Presentation Exchange]: https://identity.foundation/presentation-exchange/spec/v2.0.0

use serde::{Deserialize, Serialize};

/// A Presentation Definition: the set of input descriptors a Verifier
/// requires to be satisfied by the Wallet's `vp_token`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    /// Unique identifier for this Presentation Definition.
    pub id: String,

    /// Human-readable purpose shown to the End-User.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// The Credential formats this Definition accepts.
    pub input_descriptors: Vec<InputDescriptor>,
}

/// A single input descriptor: a request for one Credential satisfying
/// `constraints`, identified by `id` for later matching against a
/// `PresentationSubmission`'s descriptor map.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct InputDescriptor {
    /// Identifier referenced by `DescriptorMap::id`.
    pub id: String,

    /// Human-readable name shown to the End-User.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Constraints the matched Credential must satisfy.
    pub constraints: Constraints,
}

/// Constraints narrowing which Credential fields must be present (and
/// optionally match a filter) for an input descriptor to be satisfied.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Constraints {
    /// Field-level constraints. `None` means any Credential satisfies this
    /// descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
}

/// A single field constraint: one or more candidate JSONPaths, at least one
/// of which must resolve (and, if `filter` is set, match it).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Field {
    /// Candidate JSONPath expressions; the first to resolve is used.
    pub path: Vec<String>,

    /// Whether this field may be absent without failing the constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,

    /// Filter the resolved value must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

/// A JSON Schema-like filter applied to a resolved field value.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Filter {
    /// The declared JSON type of the value (`string`, `number`, ...).
    #[serde(rename = "type")]
    pub type_: String,

    /// The constraint itself.
    #[serde(flatten)]
    pub value: FilterValue,
}

/// The constraint a filter applies: exact match, regex, or named format.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum FilterValue {
    /// Exact-match constant.
    #[serde(rename = "const")]
    Const(String),

    /// Regular expression the value must match.
    #[serde(rename = "pattern")]
    Pattern(String),

    /// Named format (`date`, `date-time`, ...) the value must conform to.
    #[serde(rename = "format")]
    Format(String),
}

/// Credential format identifiers used in `DescriptorMap::format` and in
/// `client_metadata.vp_formats`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum Format {
    /// IETF SD-JWT VC, presented directly.
    #[serde(rename = "vc+sd-jwt")]
    VcSdJwt,

    /// ISO 18013-5 mobile document, CBOR-encoded.
    #[serde(rename = "mso_mdoc")]
    MsoMdoc,

    /// SD-JWT VC wrapped in a Zero-Knowledge Proof.
    #[serde(rename = "vc+sd-jwt+zkp")]
    VcSdJwtZkp,

    /// mdoc wrapped in a Zero-Knowledge Proof.
    #[serde(rename = "mso_mdoc+zkp")]
    MsoMdocZkp,
}

/// A Wallet's declaration of where, inside `vp_token`, each requested
/// Credential can be found.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    /// Identifier for this submission.
    pub id: String,

    /// The `PresentationDefinition.id` this submission satisfies.
    pub definition_id: String,

    /// One entry per satisfied input descriptor.
    pub descriptor_map: Vec<DescriptorMap>,
}

/// Maps one input descriptor to the location of its Credential inside
/// `vp_token`, via JSONPath.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DescriptorMap {
    /// The `InputDescriptor.id` this entry satisfies.
    pub id: String,

    /// The Credential format found at `path` (see [`Format`]). Kept as a
    /// raw string, not [`Format`], so an unrecognised format can still be
    /// rejected with `InvalidFormat` rather than a deserialization error.
    pub format: String,

    /// JSONPath into `vp_token` where the Credential can be found.
    pub path: String,

    /// For nested envelopes (not used by this Verifier; kept for
    /// wire-compatibility with submissions that nest a second descriptor).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<DescriptorMap>>,
}
