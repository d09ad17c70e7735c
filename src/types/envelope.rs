//! Kernel signature envelopes.
//!
//! A Kernel account routes a signature to one of its installed validation schemes by prefixing the
//! raw signature with the scheme's [`ValidationId`]:
//!
//! ```text
//! | validation type (1) | validator address or permission id (20) | signature (..) |
//! ```
//!
//! The payload runs to the end of the buffer, there are no length prefixes.

use crate::error::EnvelopeError;
use alloy::primitives::{Address, Bytes, FixedBytes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the envelope header: the type byte plus a 20-byte identifier.
pub const ENVELOPE_HEADER_LEN: usize = 21;

/// The validation type tag of a [`ValidationId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationType {
    /// Use the account's root validator.
    Root,
    /// An installed validator module.
    Validator,
    /// An installed permission.
    Permission,
    /// The EIP-7702 delegating EOA itself.
    Eip7702,
    /// A tag this crate does not know about.
    Unknown(u8),
}

impl ValidationType {
    /// Returns the wire tag.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Root => 0x00,
            Self::Validator => 0x01,
            Self::Permission => 0x02,
            Self::Eip7702 => 0x03,
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether this is one of the four tags Kernel defines.
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<u8> for ValidationType {
    fn from(tag: u8) -> Self {
        match tag {
            0x00 => Self::Root,
            0x01 => Self::Validator,
            0x02 => Self::Permission,
            0x03 => Self::Eip7702,
            tag => Self::Unknown(tag),
        }
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("VALIDATION_TYPE_ROOT"),
            Self::Validator => f.write_str("VALIDATION_TYPE_VALIDATOR"),
            Self::Permission => f.write_str("VALIDATION_TYPE_PERMISSION"),
            Self::Eip7702 => f.write_str("VALIDATION_TYPE_7702"),
            Self::Unknown(tag) => write!(f, "UNKNOWN(0x{tag:02x})"),
        }
    }
}

/// A 21-byte validation id: the type tag followed by a validator address or permission id.
///
/// This is the key of the account's `validationConfig` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationId(pub FixedBytes<21>);

impl ValidationId {
    /// The all-zero id, which Kernel reports for an unset root validator.
    pub const ZERO: Self = Self(FixedBytes::ZERO);

    /// Creates a new id from its parts.
    pub fn new(validation_type: ValidationType, identifier: FixedBytes<20>) -> Self {
        let mut id = [0u8; ENVELOPE_HEADER_LEN];
        id[0] = validation_type.as_u8();
        id[1..].copy_from_slice(identifier.as_slice());
        Self(FixedBytes(id))
    }

    /// Id of an installed validator module.
    pub fn validator(address: Address) -> Self {
        Self::new(ValidationType::Validator, address.0)
    }

    /// Returns the validation type.
    pub fn validation_type(&self) -> ValidationType {
        self.0[0].into()
    }

    /// Returns the 20-byte identifier.
    pub fn identifier(&self) -> FixedBytes<20> {
        FixedBytes::from_slice(&self.0[1..])
    }

    /// Returns the identifier interpreted as a validator address.
    pub fn validator_address(&self) -> Address {
        Address::from(self.identifier())
    }

    /// Whether this id is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<FixedBytes<21>> for ValidationId {
    fn from(id: FixedBytes<21>) -> Self {
        Self(id)
    }
}

impl From<ValidationId> for FixedBytes<21> {
    fn from(id: ValidationId) -> Self {
        id.0
    }
}

impl fmt::Display for ValidationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A signature prefixed with the validation id that should interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureEnvelope {
    /// The validation type tag.
    pub validation_type: ValidationType,
    /// Validator address or permission id.
    pub identifier: FixedBytes<20>,
    /// The raw signature interpreted by the validator.
    pub payload: Bytes,
}

impl SignatureEnvelope {
    /// Creates a new envelope.
    pub fn new(
        validation_type: ValidationType,
        identifier: FixedBytes<20>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self { validation_type, identifier, payload: payload.into() }
    }

    /// Creates an envelope routed to the given validation id.
    pub fn for_validation(id: ValidationId, payload: impl Into<Bytes>) -> Self {
        Self::new(id.validation_type(), id.identifier(), payload)
    }

    /// Decodes an envelope.
    ///
    /// Unknown validation types decode successfully as [`ValidationType::Unknown`].
    pub fn decode(data: &[u8]) -> Result<Self, EnvelopeError> {
        if data.len() < ENVELOPE_HEADER_LEN {
            return Err(EnvelopeError::Malformed { len: data.len() });
        }

        Ok(Self {
            validation_type: data[0].into(),
            identifier: FixedBytes::from_slice(&data[1..ENVELOPE_HEADER_LEN]),
            payload: Bytes::copy_from_slice(&data[ENVELOPE_HEADER_LEN..]),
        })
    }

    /// Encodes the envelope as `type || identifier || payload`.
    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.validation_type.as_u8());
        buf.extend_from_slice(self.identifier.as_slice());
        buf.extend_from_slice(&self.payload);
        buf.into()
    }

    /// Length of the encoded envelope.
    pub fn encoded_len(&self) -> usize {
        ENVELOPE_HEADER_LEN + self.payload.len()
    }

    /// Returns the validation id this envelope is routed to.
    pub fn validation_id(&self) -> ValidationId {
        ValidationId::new(self.validation_type, self.identifier)
    }

    /// Returns the identifier interpreted as a validator address.
    pub fn validator_address(&self) -> Address {
        Address::from(self.identifier)
    }

    /// Returns a copy of this envelope with a different validation type.
    pub fn with_type(&self, validation_type: ValidationType) -> Self {
        Self { validation_type, ..self.clone() }
    }
}
