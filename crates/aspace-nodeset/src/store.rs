use std::path::Path;
use std::sync::Arc;

use aspace_store::table::{Entry, NodeTable, SlotSearch};
use aspace_store::{Node, NodeRef, Nodestore, StoreError, StoreResult, TableStats};
use aspace_types::NodeId;
use tracing::{debug, warn};

use crate::config::NodesetOptions;
use crate::error::{NodesetError, NodesetResult};
use crate::parser::parse_nodeset;

/// Generation stamped on every loaded node. Loaded nodes never change.
const LOADED: u64 = 1;

/// A node store built once from a nodeset document and never modified.
///
/// Lookups return the parsed nodes directly. Every mutating operation fails
/// with [`StoreError::NotImplemented`].
pub struct XmlNodestore {
    table: NodeTable,
}

impl XmlNodestore {
    /// Parse `xml` and index its nodes.
    ///
    /// `namespace_index` is called once per entry of the document's
    /// `NamespaceUris` and returns the local index that URI maps to.
    pub fn from_xml(
        xml: &str,
        namespace_index: &mut dyn FnMut(&str) -> u16,
        options: &NodesetOptions,
    ) -> NodesetResult<Self> {
        options.table.validate()?;
        let parsed = parse_nodeset(xml, namespace_index, options)?;
        let mut table = NodeTable::try_new(options.table.clone())?;
        for node in parsed.nodes {
            table.expand_if_needed()?;
            let idx = match table.find_free_slot(&node.node_id) {
                SlotSearch::Vacant(idx) => idx,
                SlotSearch::Duplicate => return Err(NodesetError::DuplicateNode(node.node_id)),
                SlotSearch::Full => {
                    return Err(StoreError::Internal("node table is full".into()).into())
                }
            };
            table.insert_at(
                idx,
                Entry {
                    node: Arc::new(node),
                    generation: LOADED,
                },
            )?;
        }
        debug!(
            nodes = table.len(),
            namespaces = parsed.namespaces,
            aliases = parsed.aliases,
            "nodeset loaded"
        );
        Ok(Self { table })
    }

    /// Read and parse the nodeset file at `path`.
    pub fn from_path(
        path: impl AsRef<Path>,
        namespace_index: &mut dyn FnMut(&str) -> u16,
        options: &NodesetOptions,
    ) -> NodesetResult<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|source| NodesetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&xml, namespace_index, options)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    fn read_only(&self, id: &NodeId, operation: &'static str) -> StoreError {
        warn!(node = %id, operation, "write rejected: nodeset store is read-only");
        StoreError::NotImplemented(operation)
    }
}

impl Nodestore for XmlNodestore {
    fn get_node(&self, id: &NodeId) -> Option<NodeRef> {
        let entry = self.table.entry(self.table.find(id)?)?;
        Some(NodeRef::stored(Arc::clone(&entry.node), entry.generation))
    }

    fn get_node_copy(&self, id: &NodeId) -> Option<Node> {
        let entry = self.table.entry(self.table.find(id)?)?;
        Some(Node::clone(&entry.node))
    }

    fn edit_node(&self, id: &NodeId, _edit: &mut dyn FnMut(&mut Node)) -> StoreResult<()> {
        Err(self.read_only(id, "edit_node"))
    }

    fn insert_node(&self, node: Node) -> StoreResult<NodeId> {
        Err(self.read_only(&node.node_id, "insert_node"))
    }

    fn replace_node(&self, node: Node) -> StoreResult<()> {
        Err(self.read_only(&node.node_id, "replace_node"))
    }

    fn remove_node(&self, id: &NodeId) -> StoreResult<()> {
        Err(self.read_only(id, "remove_node"))
    }

    fn iterate(&self, visitor: &mut dyn FnMut(&Node)) {
        for entry in self.table.iter() {
            visitor(&entry.node);
        }
    }
}

impl std::fmt::Debug for XmlNodestore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlNodestore")
            .field("node_count", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspace_store::{BrowseDirection, NodestoreConfig};
    use aspace_types::{ns0, DataValue, ExpandedNodeId, NodeClass, QualifiedName, StatusCode, Variant};

    const TEMPERATURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<UANodeSet xmlns="http://opcfoundation.org/UA/2011/03/UANodeSet.xsd"
           xmlns:uax="http://opcfoundation.org/UA/2008/02/Types.xsd">
  <NamespaceUris>
    <Uri>http://example.com/plant/</Uri>
  </NamespaceUris>
  <Aliases>
    <Alias Alias="Double">i=11</Alias>
    <Alias Alias="HasComponent">i=47</Alias>
    <Alias Alias="HasTypeDefinition">i=40</Alias>
  </Aliases>
  <UAVariable NodeId="ns=1;i=6001" BrowseName="1:Temperature" ParentNodeId="ns=1;i=5001"
              DataType="Double" AccessLevel="3" MinimumSamplingInterval="250">
    <DisplayName>Temperature</DisplayName>
    <Description Locale="en">Boiler temperature</Description>
    <References>
      <Reference ReferenceType="HasTypeDefinition">i=63</Reference>
      <Reference ReferenceType="HasComponent" IsForward="false">ns=1;i=5001</Reference>
    </References>
    <Value>
      <uax:Double>21.5</uax:Double>
    </Value>
  </UAVariable>
</UANodeSet>"#;

    fn plant_namespace(uri: &str) -> u16 {
        assert_eq!(uri, "http://example.com/plant/");
        3
    }

    fn load(xml: &str) -> XmlNodestore {
        XmlNodestore::from_xml(xml, &mut plant_namespace, &NodesetOptions::default()).unwrap()
    }

    fn wrap(body: &str) -> String {
        format!(
            r#"<UANodeSet><NamespaceUris><Uri>http://example.com/plant/</Uri></NamespaceUris>{body}</UANodeSet>"#
        )
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    #[test]
    fn loads_variable_with_browse_name_and_data_type() {
        let store = load(TEMPERATURE);
        assert_eq!(store.len(), 1);

        let id = NodeId::numeric(3, 6001);
        let node = store.get_node(&id).expect("variable should load");
        assert_eq!(node.class(), NodeClass::Variable);
        assert_eq!(node.browse_name, QualifiedName::new(3, "Temperature"));
        assert_eq!(node.display_name.text, "Temperature");
        assert_eq!(node.description.locale, "en");

        let v = node.as_variable().unwrap();
        assert_eq!(v.data_type, NodeId::numeric(0, 11));
        assert_eq!(v.access_level, 3);
        assert_eq!(v.minimum_sampling_interval, 250.0);
        assert_eq!(node.read_value().unwrap().value, Variant::Double(21.5));
        store.release_node(node);
    }

    #[test]
    fn references_are_remapped_and_parent_not_duplicated() {
        let store = load(TEMPERATURE);
        let node = store.get_node(&NodeId::numeric(3, 6001)).unwrap();
        assert_eq!(node.reference_count(), 2);
        assert!(node.has_reference(
            &ns0::HAS_COMPONENT,
            &ExpandedNodeId::from(NodeId::numeric(3, 5001)),
            false
        ));
        assert!(node.has_reference(
            &ns0::HAS_TYPE_DEFINITION,
            &ExpandedNodeId::from(ns0::BASE_DATA_VARIABLE_TYPE),
            true
        ));
    }

    #[test]
    fn missing_parent_reference_is_synthesized() {
        let xml = wrap(
            r#"<UAObject NodeId="ns=1;s=Boiler" BrowseName="1:Boiler" ParentNodeId="i=85" EventNotifier="1"/>"#,
        );
        let store = load(&xml);
        let node = store.get_node(&NodeId::string(3, "Boiler")).unwrap();
        let parents: Vec<_> = node.browse(BrowseDirection::Inverse, None).collect();
        assert_eq!(parents.len(), 1);
        assert_eq!(*parents[0].reference_type_id, ns0::HAS_COMPONENT);
        assert_eq!(*parents[0].target, ExpandedNodeId::from(ns0::OBJECTS_FOLDER));
        assert_eq!(node.display_name.text, "Boiler");

        let options = NodesetOptions {
            synthesize_parent_reference: false,
            ..Default::default()
        };
        let store = XmlNodestore::from_xml(&xml, &mut plant_namespace, &options).unwrap();
        let node = store.get_node(&NodeId::string(3, "Boiler")).unwrap();
        assert_eq!(node.reference_count(), 0);
    }

    #[test]
    fn bare_and_prefixed_element_names_load_every_class() {
        let xml = wrap(
            r#"
            <Object NodeId="ns=1;i=1" BrowseName="1:Obj"/>
            <UAMethod NodeId="ns=1;i=2" BrowseName="1:Start" Executable="false"/>
            <UAObjectType NodeId="ns=1;i=3" BrowseName="1:PumpType" IsAbstract="true"/>
            <UAVariableType NodeId="ns=1;i=4" BrowseName="1:Level" DataType="Int32" ValueRank="1" ArrayDimensions="4">
              <Value><ListOfInt32><Int32>1</Int32><Int32>2</Int32></ListOfInt32></Value>
            </UAVariableType>
            <UAReferenceType NodeId="ns=1;i=5" BrowseName="1:Feeds" Symmetric="1">
              <InverseName>FedBy</InverseName>
            </UAReferenceType>
            <UADataType NodeId="ns=1;i=6" BrowseName="1:Mode"/>
            <View NodeId="ns=1;i=7" BrowseName="1:Overview" ContainsNoLoops="true"/>
            <UAVariable NodeId="ns=1;i=8" BrowseName="1:Name" DataType="String" Historizing="true">
              <Value><String>pump 1</String></Value>
            </UAVariable>"#,
        );
        let store = load(&xml);
        assert_eq!(store.len(), 8);

        let mut classes = Vec::new();
        store.iterate(&mut |node| classes.push(node.class()));
        for class in NodeClass::ALL {
            assert!(classes.contains(&class), "missing {class}");
        }

        let method = store.get_node(&NodeId::numeric(3, 2)).unwrap();
        assert!(matches!(&method.attributes, aspace_store::NodeAttributes::Method(m) if !m.executable));

        let level = store.get_node(&NodeId::numeric(3, 4)).unwrap();
        match &level.attributes {
            aspace_store::NodeAttributes::VariableType(vt) => {
                assert_eq!(vt.array_dimensions, vec![4]);
                assert_eq!(vt.value_rank, 1);
                assert_eq!(
                    vt.value.as_ref().map(|v| v.value.clone()),
                    Some(Variant::Array(vec![Variant::Int32(1), Variant::Int32(2)]))
                );
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let feeds = store.get_node(&NodeId::numeric(3, 5)).unwrap();
        match &feeds.attributes {
            aspace_store::NodeAttributes::ReferenceType(rt) => {
                assert!(rt.symmetric);
                assert_eq!(rt.inverse_name.text, "FedBy");
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let name = store.get_node(&NodeId::numeric(3, 8)).unwrap();
        assert_eq!(name.read_value().unwrap(), DataValue::new("pump 1"));
        assert!(name.as_variable().unwrap().historizing);
        assert_eq!(name.as_variable().unwrap().data_type, NodeId::numeric(0, 12));
    }

    #[test]
    fn structured_values_parse() {
        let xml = wrap(
            r#"
            <UAVariable NodeId="ns=1;i=10" BrowseName="1:Label" DataType="LocalizedText">
              <Value><LocalizedText><Locale>de</Locale><Text>Kessel</Text></LocalizedText></Value>
            </UAVariable>
            <UAVariable NodeId="ns=1;i=11" BrowseName="1:Ref" DataType="NodeId">
              <Value><NodeId><Identifier>ns=1;i=10</Identifier></NodeId></Value>
            </UAVariable>
            <UAVariable NodeId="ns=1;i=12" BrowseName="1:Id" DataType="Guid">
              <Value><Guid><String>0190a4f2-9c1e-7b3a-8d4e-5f6a7b8c9d0e</String></Guid></Value>
            </UAVariable>
            <UAVariable NodeId="ns=1;i=13" BrowseName="1:Blob" DataType="ByteString">
              <Value><ByteString>deadbeef</ByteString></Value>
            </UAVariable>
            <UAVariable NodeId="ns=1;i=14" BrowseName="1:Since" DataType="DateTime">
              <Value><DateTime>2024-05-01T12:00:00Z</DateTime></Value>
            </UAVariable>
            <UAVariable NodeId="ns=1;i=15" BrowseName="1:Qn" DataType="QualifiedName">
              <Value><QualifiedName><NamespaceIndex>1</NamespaceIndex><Name>Tag</Name></QualifiedName></Value>
            </UAVariable>"#,
        );
        let store = load(&xml);
        let value = |n: u32| {
            let node = store.get_node(&NodeId::numeric(3, n)).unwrap();
            node.read_value().unwrap().value
        };

        match value(10) {
            Variant::LocalizedText(t) => {
                assert_eq!(t.locale, "de");
                assert_eq!(t.text, "Kessel");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(value(11), Variant::NodeId(Box::new(NodeId::numeric(3, 10))));
        assert!(matches!(value(12), Variant::Guid(_)));
        assert_eq!(value(13), Variant::ByteString(vec![0xde, 0xad, 0xbe, 0xef]));
        assert!(matches!(value(14), Variant::DateTime(_)));
        assert_eq!(
            value(15),
            Variant::QualifiedName(Box::new(QualifiedName::new(3, "Tag")))
        );
    }

    // -----------------------------------------------------------------------
    // Read-only surface
    // -----------------------------------------------------------------------

    #[test]
    fn mutators_are_not_implemented() {
        let store = load(TEMPERATURE);
        let id = NodeId::numeric(3, 6001);

        let mut fresh = Node::new(NodeClass::Object);
        fresh.node_id = NodeId::numeric(3, 1);
        let err = store.insert_node(fresh).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_NOT_IMPLEMENTED);

        let copy = store.get_node_copy(&id).unwrap();
        assert!(matches!(
            store.replace_node(copy),
            Err(StoreError::NotImplemented(_))
        ));
        assert!(matches!(
            store.remove_node(&id),
            Err(StoreError::NotImplemented(_))
        ));
        assert!(matches!(
            store.edit_node(&id, &mut |_| {}),
            Err(StoreError::NotImplemented(_))
        ));
        assert_eq!(store.len(), 1);
        assert!(store.get_node(&id).is_some());
    }

    #[test]
    fn copies_are_detached() {
        let store = load(TEMPERATURE);
        let id = NodeId::numeric(3, 6001);
        let mut copy = store.get_node_copy(&id).unwrap();
        copy.write_value(DataValue::new(99.0)).unwrap();
        store.delete_node(copy);
        let node = store.get_node(&id).unwrap();
        assert_eq!(node.read_value().unwrap().value, Variant::Double(21.5));
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn undeclared_namespace_is_rejected() {
        let xml = wrap(r#"<UAObject NodeId="ns=2;i=1" BrowseName="2:X"/>"#);
        let err = XmlNodestore::from_xml(&xml, &mut plant_namespace, &NodesetOptions::default())
            .unwrap_err();
        assert!(matches!(err, NodesetError::UnknownNamespace { index: 2, .. }));
        assert_eq!(err.status_code(), StatusCode::BAD_DECODING_ERROR);
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let xml = wrap(
            r#"<UAObject NodeId="ns=1;i=1" BrowseName="1:A"/><UAObject NodeId="ns=1;i=1" BrowseName="1:B"/>"#,
        );
        let err = XmlNodestore::from_xml(&xml, &mut plant_namespace, &NodesetOptions::default())
            .unwrap_err();
        assert!(matches!(err, NodesetError::DuplicateNode(_)));
    }

    #[test]
    fn invalid_table_config_is_rejected_before_parsing() {
        let options = NodesetOptions {
            table: NodestoreConfig {
                grow_numerator: 4,
                grow_denominator: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut calls = 0;
        let mut counting = |_: &str| -> u16 {
            calls += 1;
            3
        };
        let err = XmlNodestore::from_xml(TEMPERATURE, &mut counting, &options).unwrap_err();
        assert!(matches!(err, NodesetError::Store(StoreError::InvalidConfig(_))));
        assert_eq!(err.status_code(), StatusCode::BAD_INVALID_ARGUMENT);
        assert_eq!(calls, 0);
    }

    #[test]
    fn errors_name_the_offending_node() {
        let xml = wrap(r#"<UAVariable NodeId="ns=1;i=1" BrowseName="1:A" ValueRank="many"/>"#);
        let err = XmlNodestore::from_xml(&xml, &mut plant_namespace, &NodesetOptions::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ns=1;i=1"), "{message}");
        assert!(message.contains("ValueRank"), "{message}");

        let xml = wrap(r#"<UAObject BrowseName="1:A"/>"#);
        assert!(matches!(
            XmlNodestore::from_xml(&xml, &mut plant_namespace, &NodesetOptions::default()),
            Err(NodesetError::MissingAttribute { attribute: "NodeId", .. })
        ));

        assert!(matches!(
            XmlNodestore::from_xml("<UANodeSet>", &mut plant_namespace, &NodesetOptions::default()),
            Err(NodesetError::Xml(_))
        ));
    }

    #[test]
    fn unknown_elements_skip_or_fail() {
        let xml = wrap(r#"<UAWidget NodeId="ns=1;i=1"/><UAObject NodeId="ns=1;i=2" BrowseName="1:B"/>"#);
        assert_eq!(load(&xml).len(), 1);

        let strict = NodesetOptions {
            skip_unknown_elements: false,
            ..Default::default()
        };
        let err = XmlNodestore::from_xml(&xml, &mut plant_namespace, &strict).unwrap_err();
        assert!(matches!(err, NodesetError::UnknownElement(ref tag) if tag == "UAWidget"));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = XmlNodestore::from_path(
            "/nonexistent/aspace/nodeset.xml",
            &mut plant_namespace,
            &NodesetOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_RESOURCE_UNAVAILABLE);
    }
}
