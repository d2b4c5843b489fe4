use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The discriminant selecting a node variant.
///
/// Discriminant values are the OPC-UA NodeClass mask bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum NodeClass {
    Object = 1,
    Variable = 2,
    Method = 4,
    ObjectType = 8,
    VariableType = 16,
    ReferenceType = 32,
    DataType = 64,
    View = 128,
}

impl NodeClass {
    pub const ALL: [NodeClass; 8] = [
        NodeClass::Object,
        NodeClass::Variable,
        NodeClass::Method,
        NodeClass::ObjectType,
        NodeClass::VariableType,
        NodeClass::ReferenceType,
        NodeClass::DataType,
        NodeClass::View,
    ];

    pub fn mask(self) -> u32 {
        self as u32
    }

    pub fn from_mask(mask: u32) -> Result<Self, TypeError> {
        Self::ALL
            .into_iter()
            .find(|class| class.mask() == mask)
            .ok_or(TypeError::UnknownNodeClass(mask))
    }

    /// Returns `true` for the type-defining classes.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            NodeClass::ObjectType
                | NodeClass::VariableType
                | NodeClass::ReferenceType
                | NodeClass::DataType
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeClass::Object => "Object",
            NodeClass::Variable => "Variable",
            NodeClass::Method => "Method",
            NodeClass::ObjectType => "ObjectType",
            NodeClass::VariableType => "VariableType",
            NodeClass::ReferenceType => "ReferenceType",
            NodeClass::DataType => "DataType",
            NodeClass::View => "View",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
