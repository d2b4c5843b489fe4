//! The node variant model.
//!
//! A [`Node`] is a common header (identity, names, write masks, references)
//! plus a class-specific payload in [`NodeAttributes`]. The class tag is
//! derived from the payload, so the two can never disagree.

use std::fmt;
use std::sync::Arc;

use aspace_types::{DataValue, LocalizedText, NodeClass, NodeId, QualifiedName};

use crate::error::{StoreError, StoreResult};
use crate::references::ReferenceKind;

/// Value rank of a scalar.
pub const VALUE_RANK_SCALAR: i32 = -1;

/// AccessLevel bit: current value is readable.
pub const ACCESS_LEVEL_READ: u8 = 0x01;
/// AccessLevel bit: current value is writable.
pub const ACCESS_LEVEL_WRITE: u8 = 0x02;

/// An external producer of a Variable's value.
///
/// The source is read on every access instead of the value being stored in
/// the node. Implementations own whatever state backs the value.
pub trait DataSource: Send + Sync {
    fn read(&self, node_id: &NodeId) -> StoreResult<DataValue>;

    /// Push a new value to the source. Read-only sources keep the default.
    fn write(&self, node_id: &NodeId, _value: &DataValue) -> StoreResult<()> {
        Err(StoreError::NotWritable(node_id.clone()))
    }
}

/// Where a Variable's value comes from.
#[derive(Clone)]
pub enum ValueSource {
    Data(DataValue),
    Callback(Arc<dyn DataSource>),
}

impl Default for ValueSource {
    fn default() -> Self {
        ValueSource::Data(DataValue::default())
    }
}

impl PartialEq for ValueSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueSource::Data(a), ValueSource::Data(b)) => a == b,
            (ValueSource::Callback(a), ValueSource::Callback(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Data(value) => f.debug_tuple("Data").field(value).finish(),
            ValueSource::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectAttributes {
    pub event_notifier: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableAttributes {
    pub data_type: NodeId,
    pub value_rank: i32,
    pub array_dimensions: Vec<u32>,
    pub access_level: u8,
    pub user_access_level: u8,
    pub minimum_sampling_interval: f64,
    pub historizing: bool,
    pub value: ValueSource,
}

impl Default for VariableAttributes {
    fn default() -> Self {
        Self {
            data_type: aspace_types::ns0::BASE_DATA_TYPE,
            value_rank: VALUE_RANK_SCALAR,
            array_dimensions: Vec::new(),
            access_level: ACCESS_LEVEL_READ,
            user_access_level: ACCESS_LEVEL_READ,
            minimum_sampling_interval: 0.0,
            historizing: false,
            value: ValueSource::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodAttributes {
    pub executable: bool,
    pub user_executable: bool,
}

impl Default for MethodAttributes {
    fn default() -> Self {
        Self {
            executable: true,
            user_executable: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectTypeAttributes {
    pub is_abstract: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableTypeAttributes {
    pub data_type: NodeId,
    pub value_rank: i32,
    pub array_dimensions: Vec<u32>,
    pub value: Option<DataValue>,
    pub is_abstract: bool,
}

impl Default for VariableTypeAttributes {
    fn default() -> Self {
        Self {
            data_type: aspace_types::ns0::BASE_DATA_TYPE,
            value_rank: VALUE_RANK_SCALAR,
            array_dimensions: Vec::new(),
            value: None,
            is_abstract: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceTypeAttributes {
    pub is_abstract: bool,
    pub symmetric: bool,
    pub inverse_name: LocalizedText,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataTypeAttributes {
    pub is_abstract: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewAttributes {
    pub contains_no_loops: bool,
    pub event_notifier: u8,
}

/// Class-specific payload of a node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeAttributes {
    Object(ObjectAttributes),
    Variable(VariableAttributes),
    Method(MethodAttributes),
    ObjectType(ObjectTypeAttributes),
    VariableType(VariableTypeAttributes),
    ReferenceType(ReferenceTypeAttributes),
    DataType(DataTypeAttributes),
    View(ViewAttributes),
}

impl NodeAttributes {
    /// Zeroed payload for `class`.
    pub fn new(class: NodeClass) -> Self {
        match class {
            NodeClass::Object => NodeAttributes::Object(ObjectAttributes::default()),
            NodeClass::Variable => NodeAttributes::Variable(VariableAttributes::default()),
            NodeClass::Method => NodeAttributes::Method(MethodAttributes::default()),
            NodeClass::ObjectType => NodeAttributes::ObjectType(ObjectTypeAttributes::default()),
            NodeClass::VariableType => {
                NodeAttributes::VariableType(VariableTypeAttributes::default())
            }
            NodeClass::ReferenceType => {
                NodeAttributes::ReferenceType(ReferenceTypeAttributes::default())
            }
            NodeClass::DataType => NodeAttributes::DataType(DataTypeAttributes::default()),
            NodeClass::View => NodeAttributes::View(ViewAttributes::default()),
        }
    }

    pub fn class(&self) -> NodeClass {
        match self {
            NodeAttributes::Object(_) => NodeClass::Object,
            NodeAttributes::Variable(_) => NodeClass::Variable,
            NodeAttributes::Method(_) => NodeClass::Method,
            NodeAttributes::ObjectType(_) => NodeClass::ObjectType,
            NodeAttributes::VariableType(_) => NodeClass::VariableType,
            NodeAttributes::ReferenceType(_) => NodeClass::ReferenceType,
            NodeAttributes::DataType(_) => NodeClass::DataType,
            NodeAttributes::View(_) => NodeClass::View,
        }
    }
}

/// Where a detached copy came from: the store instance and the generation of
/// the occupant it was copied from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Provenance {
    pub store: u64,
    pub generation: u64,
}

/// The unit of storage.
///
/// Once inserted a node is owned by the store. A copy obtained from
/// `get_node_copy` is owned by the caller and remembers its [`Provenance`]
/// until it is installed with `replace_node` or dropped.
#[derive(Clone, Debug)]
pub struct Node {
    pub node_id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: LocalizedText,
    pub description: LocalizedText,
    pub write_mask: u32,
    pub user_write_mask: u32,
    pub attributes: NodeAttributes,
    pub(crate) references: Vec<ReferenceKind>,
    provenance: Option<Provenance>,
}

impl Node {
    /// A bare node of `class` with every other field zeroed.
    pub fn new(class: NodeClass) -> Self {
        Self {
            node_id: NodeId::null(),
            browse_name: QualifiedName::default(),
            display_name: LocalizedText::default(),
            description: LocalizedText::default(),
            write_mask: 0,
            user_write_mask: 0,
            attributes: NodeAttributes::new(class),
            references: Vec::new(),
            provenance: None,
        }
    }

    pub fn class(&self) -> NodeClass {
        self.attributes.class()
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.provenance
    }

    pub(crate) fn set_provenance(&mut self, provenance: Option<Provenance>) {
        self.provenance = provenance;
    }

    /// Deep-copy `src` into `self`. Both nodes must be of the same class.
    ///
    /// Copies the header, the references, and then the class payload. The
    /// provenance of `self` is left untouched.
    pub fn copy_from(&mut self, src: &Node) -> StoreResult<()> {
        if self.class() != src.class() {
            return Err(StoreError::ClassMismatch {
                id: src.node_id.clone(),
                expected: self.class(),
                found: src.class(),
            });
        }
        let mut references = Vec::new();
        references.try_reserve_exact(src.references.len())?;
        references.extend(src.references.iter().cloned());

        self.node_id = src.node_id.clone();
        self.browse_name = src.browse_name.clone();
        self.display_name = src.display_name.clone();
        self.description = src.description.clone();
        self.write_mask = src.write_mask;
        self.user_write_mask = src.user_write_mask;
        self.references = references;
        self.attributes = match &src.attributes {
            NodeAttributes::Object(a) => NodeAttributes::Object(a.clone()),
            NodeAttributes::Variable(a) => NodeAttributes::Variable(a.clone()),
            NodeAttributes::Method(a) => NodeAttributes::Method(a.clone()),
            NodeAttributes::ObjectType(a) => NodeAttributes::ObjectType(a.clone()),
            NodeAttributes::VariableType(a) => NodeAttributes::VariableType(a.clone()),
            NodeAttributes::ReferenceType(a) => NodeAttributes::ReferenceType(a.clone()),
            NodeAttributes::DataType(a) => NodeAttributes::DataType(a.clone()),
            NodeAttributes::View(a) => NodeAttributes::View(a.clone()),
        };
        Ok(())
    }

    /// Release everything the node owns while keeping its class: first the
    /// reference arrays, then the class payload (a Variable's value or data
    /// source, a ReferenceType's inverse name, ...), then the header.
    pub fn delete_members(&mut self) {
        self.references = Vec::new();
        self.attributes = NodeAttributes::new(self.class());
        self.node_id = NodeId::null();
        self.browse_name = QualifiedName::default();
        self.display_name = LocalizedText::default();
        self.description = LocalizedText::default();
        self.write_mask = 0;
        self.user_write_mask = 0;
        self.provenance = None;
    }

    pub fn as_variable(&self) -> Option<&VariableAttributes> {
        match &self.attributes {
            NodeAttributes::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut VariableAttributes> {
        match &mut self.attributes {
            NodeAttributes::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Read the Value attribute of a Variable or VariableType.
    pub fn read_value(&self) -> StoreResult<DataValue> {
        match &self.attributes {
            NodeAttributes::Variable(v) => match &v.value {
                ValueSource::Data(value) => Ok(value.clone()),
                ValueSource::Callback(source) => source.read(&self.node_id),
            },
            NodeAttributes::VariableType(vt) => Ok(vt.value.clone().unwrap_or_default()),
            _ => Err(StoreError::NodeClassInvalid {
                id: self.node_id.clone(),
                class: self.class(),
            }),
        }
    }

    /// Write the Value attribute of a Variable. Stored values are replaced;
    /// callback-backed values are forwarded to their source.
    pub fn write_value(&mut self, value: DataValue) -> StoreResult<()> {
        let id = self.node_id.clone();
        let class = self.class();
        match &mut self.attributes {
            NodeAttributes::Variable(v) => match &mut v.value {
                ValueSource::Data(current) => {
                    *current = value;
                    Ok(())
                }
                ValueSource::Callback(source) => source.write(&id, &value),
            },
            _ => Err(StoreError::NodeClassInvalid { id, class }),
        }
    }
}

/// Nodes compare by content. Provenance is bookkeeping and is ignored.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
            && self.browse_name == other.browse_name
            && self.display_name == other.display_name
            && self.description == other.description
            && self.write_mask == other.write_mask
            && self.user_write_mask == other.user_write_mask
            && self.attributes == other.attributes
            && self.references == other.references
    }
}
