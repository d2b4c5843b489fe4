use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::names::{LocalizedText, QualifiedName};
use crate::node_id::NodeId;
use crate::status::StatusCode;

/// Built-in data types a [`Variant`] can carry, numbered as in namespace 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum BuiltinType {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    NodeId = 17,
    QualifiedName = 20,
    LocalizedText = 21,
}

impl BuiltinType {
    const ALL: [BuiltinType; 18] = [
        BuiltinType::Boolean,
        BuiltinType::SByte,
        BuiltinType::Byte,
        BuiltinType::Int16,
        BuiltinType::UInt16,
        BuiltinType::Int32,
        BuiltinType::UInt32,
        BuiltinType::Int64,
        BuiltinType::UInt64,
        BuiltinType::Float,
        BuiltinType::Double,
        BuiltinType::String,
        BuiltinType::DateTime,
        BuiltinType::Guid,
        BuiltinType::ByteString,
        BuiltinType::NodeId,
        BuiltinType::QualifiedName,
        BuiltinType::LocalizedText,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Boolean => "Boolean",
            BuiltinType::SByte => "SByte",
            BuiltinType::Byte => "Byte",
            BuiltinType::Int16 => "Int16",
            BuiltinType::UInt16 => "UInt16",
            BuiltinType::Int32 => "Int32",
            BuiltinType::UInt32 => "UInt32",
            BuiltinType::Int64 => "Int64",
            BuiltinType::UInt64 => "UInt64",
            BuiltinType::Float => "Float",
            BuiltinType::Double => "Double",
            BuiltinType::String => "String",
            BuiltinType::DateTime => "DateTime",
            BuiltinType::Guid => "Guid",
            BuiltinType::ByteString => "ByteString",
            BuiltinType::NodeId => "NodeId",
            BuiltinType::QualifiedName => "QualifiedName",
            BuiltinType::LocalizedText => "LocalizedText",
        }
    }

    /// Look up a built-in type by its nodeset name (e.g. `"Double"`).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn from_node_id(id: &NodeId) -> Option<Self> {
        if id.namespace != 0 {
            return None;
        }
        let n = id.as_numeric()?;
        Self::ALL.into_iter().find(|t| *t as u32 == n)
    }

    /// The DataType node of this built-in type.
    pub fn node_id(self) -> NodeId {
        NodeId::numeric(0, self as u32)
    }
}

impl std::fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A value of one of the built-in types, or an array of them.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    ByteString(Vec<u8>),
    NodeId(Box<NodeId>),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    Array(Vec<Variant>),
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// The built-in type carried. Arrays report their first element's type.
    pub fn builtin_type(&self) -> Option<BuiltinType> {
        let ty = match self {
            Variant::Empty => return None,
            Variant::Array(items) => return items.first().and_then(Variant::builtin_type),
            Variant::Boolean(_) => BuiltinType::Boolean,
            Variant::SByte(_) => BuiltinType::SByte,
            Variant::Byte(_) => BuiltinType::Byte,
            Variant::Int16(_) => BuiltinType::Int16,
            Variant::UInt16(_) => BuiltinType::UInt16,
            Variant::Int32(_) => BuiltinType::Int32,
            Variant::UInt32(_) => BuiltinType::UInt32,
            Variant::Int64(_) => BuiltinType::Int64,
            Variant::UInt64(_) => BuiltinType::UInt64,
            Variant::Float(_) => BuiltinType::Float,
            Variant::Double(_) => BuiltinType::Double,
            Variant::String(_) => BuiltinType::String,
            Variant::DateTime(_) => BuiltinType::DateTime,
            Variant::Guid(_) => BuiltinType::Guid,
            Variant::ByteString(_) => BuiltinType::ByteString,
            Variant::NodeId(_) => BuiltinType::NodeId,
            Variant::QualifiedName(_) => BuiltinType::QualifiedName,
            Variant::LocalizedText(_) => BuiltinType::LocalizedText,
        };
        Some(ty)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_string())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(s)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int32(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

/// A value together with its status and timestamps.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Variant,
    pub status: StatusCode,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    pub fn new(value: impl Into<Variant>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Stamp the value with the current time as its source timestamp.
    pub fn with_source_timestamp(mut self) -> Self {
        self.source_timestamp = Some(Utc::now());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}
