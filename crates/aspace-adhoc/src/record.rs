//! The external record table an [`AdhocNodestore`](crate::AdhocNodestore)
//! synthesizes nodes from.

use std::collections::HashMap;

use aspace_store::{StoreError, StoreResult};
use aspace_types::{ns0, NodeClass, NodeId, QualifiedName};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One externally owned node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendRecord {
    pub node_id: NodeId,
    pub class: NodeClass,
    pub browse_name: QualifiedName,
    /// The node this one hangs under, if any.
    pub parent: Option<NodeId>,
    /// Hierarchical reference type from the parent to this node.
    pub parent_reference: NodeId,
    /// Current value of a Variable record, as text.
    pub value: Option<String>,
}

impl BackendRecord {
    pub fn object(node_id: NodeId, browse_name: QualifiedName) -> Self {
        Self {
            node_id,
            class: NodeClass::Object,
            browse_name,
            parent: None,
            parent_reference: ns0::ORGANIZES,
            value: None,
        }
    }

    pub fn variable(node_id: NodeId, browse_name: QualifiedName, value: impl Into<String>) -> Self {
        Self {
            node_id,
            class: NodeClass::Variable,
            browse_name,
            parent: None,
            parent_reference: ns0::HAS_COMPONENT,
            value: Some(value.into()),
        }
    }

    /// Hang this record under `parent`. The reference type set by the
    /// constructor is kept.
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_parent_reference(mut self, reference_type: NodeId) -> Self {
        self.parent_reference = reference_type;
        self
    }
}

/// The fixed set of backend records, shared between the store and the data
/// sources it hands out. Record identities never change after construction;
/// Variable values do.
#[derive(Debug, Default)]
pub struct RecordTable {
    records: RwLock<HashMap<NodeId, BackendRecord>>,
}

impl RecordTable {
    /// Build the table. Each record must have a distinct id and every
    /// Variable record must carry a value.
    pub fn new(records: impl IntoIterator<Item = BackendRecord>) -> StoreResult<Self> {
        let mut map = HashMap::new();
        for record in records {
            if map.contains_key(&record.node_id) {
                return Err(StoreError::AlreadyExists(record.node_id));
            }
            if record.class == NodeClass::Variable && record.value.is_none() {
                return Err(StoreError::InvalidConfig(format!(
                    "variable record {} has no value",
                    record.node_id
                )));
            }
            map.insert(record.node_id.clone(), record);
        }
        Ok(Self {
            records: RwLock::new(map),
        })
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.records.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of the record with `id`.
    pub fn get(&self, id: &NodeId) -> Option<BackendRecord> {
        self.records.read().get(id).cloned()
    }

    /// Records whose parent is `id`, with the reference type linking them.
    pub fn children(&self, id: &NodeId) -> Vec<(NodeId, NodeId)> {
        let mut children: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.parent.as_ref() == Some(id))
            .map(|r| (r.node_id.clone(), r.parent_reference.clone()))
            .collect();
        children.sort();
        children
    }

    pub fn value(&self, id: &NodeId) -> Option<String> {
        self.records.read().get(id).and_then(|r| r.value.clone())
    }

    /// Update the value of a Variable record.
    pub fn set_value(&self, id: &NodeId, value: impl Into<String>) -> StoreResult<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NodeIdUnknown(id.clone()))?;
        if record.class != NodeClass::Variable {
            return Err(StoreError::NodeClassInvalid {
                id: id.clone(),
                class: record.class,
            });
        }
        record.value = Some(value.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RecordTable {
        let root = NodeId::numeric(1, 1000);
        RecordTable::new([
            BackendRecord::object(root.clone(), QualifiedName::new(1, "PilzDeviceRoot"))
                .with_parent(ns0::OBJECTS_FOLDER),
            BackendRecord::variable(NodeId::numeric(1, 1002), QualifiedName::new(1, "Serial"), "B")
                .with_parent(root.clone()),
            BackendRecord::variable(NodeId::numeric(1, 1001), QualifiedName::new(1, "Model"), "A")
                .with_parent(root)
                .with_parent_reference(ns0::HAS_PROPERTY),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_records_are_rejected() {
        let id = NodeId::numeric(1, 1);
        let err = RecordTable::new([
            BackendRecord::object(id.clone(), QualifiedName::new(1, "a")),
            BackendRecord::object(id, QualifiedName::new(1, "b")),
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn variable_records_need_a_value() {
        let mut record =
            BackendRecord::variable(NodeId::numeric(1, 7), QualifiedName::new(1, "Serial"), "B");
        record.value = None;
        let err = RecordTable::new([record]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
        assert!(err.to_string().contains("ns=1;i=7"));

        // Objects carry no value.
        let table = RecordTable::new([BackendRecord::object(
            NodeId::numeric(1, 8),
            QualifiedName::new(1, "Rack"),
        )])
        .unwrap();
        assert_eq!(table.value(&NodeId::numeric(1, 8)), None);
    }

    #[test]
    fn children_are_found_by_parent() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.children(&NodeId::numeric(1, 1000)),
            vec![
                (NodeId::numeric(1, 1001), ns0::HAS_PROPERTY),
                (NodeId::numeric(1, 1002), ns0::HAS_COMPONENT),
            ]
        );
        assert!(table.children(&NodeId::numeric(1, 1001)).is_empty());
    }

    #[test]
    fn set_value_only_touches_variables() {
        let table = table();
        table.set_value(&NodeId::numeric(1, 1001), "PNOZ m B1").unwrap();
        assert_eq!(table.value(&NodeId::numeric(1, 1001)).as_deref(), Some("PNOZ m B1"));

        assert!(matches!(
            table.set_value(&NodeId::numeric(1, 1000), "x"),
            Err(StoreError::NodeClassInvalid { .. })
        ));
        assert!(matches!(
            table.set_value(&NodeId::numeric(1, 5), "x"),
            Err(StoreError::NodeIdUnknown(_))
        ));
    }

    #[test]
    fn records_deserialize_from_json() {
        let json = r#"{
            "node_id": {"namespace": 1, "identifier": {"Numeric": 1000}},
            "class": "Object",
            "browse_name": {"namespace_index": 1, "name": "PilzDeviceRoot"},
            "parent": null,
            "parent_reference": {"namespace": 0, "identifier": {"Numeric": 35}},
            "value": null
        }"#;
        let record: BackendRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record,
            BackendRecord::object(NodeId::numeric(1, 1000), QualifiedName::new(1, "PilzDeviceRoot"))
        );
    }
}
