//! Scalar and attribute type definitions.

use serde::{Deserialize, Serialize};

/// Scalar data types supported by strata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

impl ScalarType {
    /// Stable single-byte tag used in version hashing.
    pub(crate) fn hash_tag(self) -> u8 {
        match self {
            ScalarType::Bool => 0,
            ScalarType::Int32 => 1,
            ScalarType::Int64 => 2,
            ScalarType::Float32 => 3,
            ScalarType::Float64 => 4,
            ScalarType::String => 5,
            ScalarType::Bytes => 6,
            ScalarType::Timestamp => 7,
            ScalarType::Uuid => 8,
        }
    }
}

/// Attribute types - a scalar, required or optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// A required scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    Optional(ScalarType),
}

impl AttributeType {
    /// Create a required scalar attribute type.
    pub fn scalar(scalar: ScalarType) -> Self {
        AttributeType::Scalar(scalar)
    }

    /// Create an optional scalar attribute type.
    pub fn optional(scalar: ScalarType) -> Self {
        AttributeType::Optional(scalar)
    }

    /// Check if this type is nullable.
    pub fn is_optional(&self) -> bool {
        matches!(self, AttributeType::Optional(_))
    }

    /// Get the inner scalar type.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            AttributeType::Scalar(s) | AttributeType::Optional(s) => *s,
        }
    }
}
