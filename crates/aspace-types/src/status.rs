use std::fmt;

use serde::{Deserialize, Serialize};

/// An OPC-UA status code.
///
/// The top two bits carry the severity: `00` good, `01` uncertain, `10` bad.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: Self = Self(0x0000_0000);
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    pub const BAD_OUT_OF_MEMORY: Self = Self(0x8003_0000);
    pub const BAD_RESOURCE_UNAVAILABLE: Self = Self(0x8004_0000);
    pub const BAD_DECODING_ERROR: Self = Self(0x8007_0000);
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    pub const BAD_NOT_READABLE: Self = Self(0x803A_0000);
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    pub const BAD_NOT_IMPLEMENTED: Self = Self(0x8040_0000);
    pub const BAD_NODE_ID_EXISTS: Self = Self(0x805E_0000);
    pub const BAD_NODE_CLASS_INVALID: Self = Self(0x805F_0000);
    pub const BAD_DUPLICATE_REFERENCE_NOT_ALLOWED: Self = Self(0x8066_0000);
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    pub const BAD_INVALID_ARGUMENT: Self = Self(0x80AB_0000);

    pub fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    pub fn is_uncertain(self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Symbolic name of a known code, `None` for codes this crate never emits.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::GOOD => "Good",
            Self::BAD_INTERNAL_ERROR => "BadInternalError",
            Self::BAD_OUT_OF_MEMORY => "BadOutOfMemory",
            Self::BAD_RESOURCE_UNAVAILABLE => "BadResourceUnavailable",
            Self::BAD_DECODING_ERROR => "BadDecodingError",
            Self::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            Self::BAD_NOT_READABLE => "BadNotReadable",
            Self::BAD_NOT_WRITABLE => "BadNotWritable",
            Self::BAD_NOT_IMPLEMENTED => "BadNotImplemented",
            Self::BAD_NODE_ID_EXISTS => "BadNodeIdExists",
            Self::BAD_NODE_CLASS_INVALID => "BadNodeClassInvalid",
            Self::BAD_DUPLICATE_REFERENCE_NOT_ALLOWED => "BadDuplicateReferenceNotAllowed",
            Self::BAD_TYPE_MISMATCH => "BadTypeMismatch",
            Self::BAD_INVALID_ARGUMENT => "BadInvalidArgument",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#010x})", self.0),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({self})")
    }
}
