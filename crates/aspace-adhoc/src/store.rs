use std::sync::Arc;

use aspace_store::{
    DataSource, Node, NodeRef, Nodestore, StoreError, StoreResult, ValueSource,
    ACCESS_LEVEL_READ, ACCESS_LEVEL_WRITE,
};
use aspace_types::{ns0, BuiltinType, DataValue, LocalizedText, NodeClass, NodeId, Variant};
use tracing::{debug, warn};

use crate::record::{BackendRecord, RecordTable};

/// Reads and writes a Variable record's value in the shared table.
struct RecordValue {
    records: Arc<RecordTable>,
}

impl DataSource for RecordValue {
    fn read(&self, node_id: &NodeId) -> StoreResult<DataValue> {
        let value = self
            .records
            .value(node_id)
            .ok_or_else(|| StoreError::NodeIdUnknown(node_id.clone()))?;
        Ok(DataValue::new(value).with_source_timestamp())
    }

    fn write(&self, node_id: &NodeId, value: &DataValue) -> StoreResult<()> {
        match &value.value {
            Variant::String(s) => self.records.set_value(node_id, s.as_str()),
            _ => Err(StoreError::TypeMismatch {
                id: node_id.clone(),
                expected: BuiltinType::String,
            }),
        }
    }
}

/// A node store over an external record table.
///
/// Ids present in the [`RecordTable`] are served by synthesizing a fresh
/// node from the record on every lookup. Every other id is delegated to the
/// fallback store. Synthesized nodes are never stored, so they cannot be
/// replaced or edited and are not visited by `iterate`.
pub struct AdhocNodestore {
    records: Arc<RecordTable>,
    fallback: Arc<dyn Nodestore>,
}

impl AdhocNodestore {
    pub fn new(records: Arc<RecordTable>, fallback: Arc<dyn Nodestore>) -> Self {
        Self { records, fallback }
    }

    pub fn records(&self) -> &Arc<RecordTable> {
        &self.records
    }

    pub fn fallback(&self) -> &Arc<dyn Nodestore> {
        &self.fallback
    }

    /// Whether `id` is owned by the record table.
    pub fn is_backend_node(&self, id: &NodeId) -> bool {
        self.records.contains(id)
    }

    /// Update the external value behind a Variable record. Nodes read after
    /// this call observe the new value.
    pub fn set_value(&self, id: &NodeId, value: impl Into<String>) -> StoreResult<()> {
        self.records.set_value(id, value)
    }

    /// Build a node from `record`.
    ///
    /// Objects and Variables get a type definition, every record with a
    /// parent gets an inverse reference to it, and each child record gets a
    /// forward reference. A Variable's value is read through the table.
    pub fn synthesize(&self, record: &BackendRecord) -> StoreResult<Node> {
        let mut node = Node::new(record.class);
        node.node_id = record.node_id.clone();
        node.browse_name = record.browse_name.clone();
        node.display_name = LocalizedText::from(record.browse_name.name.as_str());

        let type_definition = match record.class {
            NodeClass::Object => Some(ns0::BASE_OBJECT_TYPE),
            NodeClass::Variable => Some(ns0::BASE_DATA_VARIABLE_TYPE),
            _ => None,
        };
        if let Some(type_definition) = type_definition {
            node.add_reference(&ns0::HAS_TYPE_DEFINITION, type_definition.into(), true)?;
        }
        if let Some(parent) = &record.parent {
            node.add_reference(&record.parent_reference, parent.clone().into(), false)?;
        }
        for (child, reference_type) in self.records.children(&record.node_id) {
            node.add_reference(&reference_type, child.into(), true)?;
        }

        if let Some(variable) = node.as_variable_mut() {
            variable.data_type = BuiltinType::String.node_id();
            variable.access_level = ACCESS_LEVEL_READ | ACCESS_LEVEL_WRITE;
            variable.user_access_level = ACCESS_LEVEL_READ | ACCESS_LEVEL_WRITE;
            variable.value = ValueSource::Callback(Arc::new(RecordValue {
                records: Arc::clone(&self.records),
            }));
        }
        Ok(node)
    }

    fn synthesize_id(&self, id: &NodeId) -> Option<Node> {
        let record = self.records.get(id)?;
        match self.synthesize(&record) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!(node = %id, error = %e, "failed to synthesize backend node");
                None
            }
        }
    }
}

impl Nodestore for AdhocNodestore {
    fn new_node(&self, class: NodeClass) -> Node {
        self.fallback.new_node(class)
    }

    fn delete_node(&self, node: Node) {
        self.fallback.delete_node(node);
    }

    fn get_node(&self, id: &NodeId) -> Option<NodeRef> {
        if self.is_backend_node(id) {
            return self.synthesize_id(id).map(NodeRef::transient);
        }
        self.fallback.get_node(id)
    }

    /// Backend ids yield a synthesized copy. It carries no provenance, so
    /// handing it to `replace_node` fails.
    fn get_node_copy(&self, id: &NodeId) -> Option<Node> {
        if self.is_backend_node(id) {
            return self.synthesize_id(id);
        }
        self.fallback.get_node_copy(id)
    }

    fn release_node(&self, node: NodeRef) {
        if node.is_transient() {
            drop(node);
        } else {
            self.fallback.release_node(node);
        }
    }

    fn edit_node(&self, id: &NodeId, edit: &mut dyn FnMut(&mut Node)) -> StoreResult<()> {
        if self.is_backend_node(id) {
            warn!(node = %id, "edit rejected: node is owned by the record table");
            return Err(StoreError::NotWritable(id.clone()));
        }
        self.fallback.edit_node(id, edit)
    }

    fn insert_node(&self, node: Node) -> StoreResult<NodeId> {
        if self.is_backend_node(&node.node_id) {
            warn!(node = %node.node_id, "insert rejected: id is owned by the record table");
            return Err(StoreError::AlreadyExists(node.node_id));
        }
        let id = self.fallback.insert_node(node)?;
        if self.is_backend_node(&id) {
            warn!(node = %id, "assigned id is shadowed by a backend record");
        }
        Ok(id)
    }

    fn replace_node(&self, node: Node) -> StoreResult<()> {
        if self.is_backend_node(&node.node_id) {
            warn!(node = %node.node_id, "replace rejected: id is owned by the record table");
            return Err(StoreError::Internal(format!(
                "backend node {} cannot be replaced",
                node.node_id
            )));
        }
        self.fallback.replace_node(node)
    }

    fn remove_node(&self, id: &NodeId) -> StoreResult<()> {
        if self.is_backend_node(id) {
            debug!(node = %id, "ignoring removal of backend node");
            return Ok(());
        }
        self.fallback.remove_node(id)
    }

    /// Visits the fallback's nodes only.
    fn iterate(&self, visitor: &mut dyn FnMut(&Node)) {
        self.fallback.iterate(visitor);
    }
}

impl std::fmt::Debug for AdhocNodestore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdhocNodestore")
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}
