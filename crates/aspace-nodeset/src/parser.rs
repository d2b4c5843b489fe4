//! Nodeset XML to [`Node`] conversion.
//!
//! The document is walked in three passes over the root's children:
//! namespace URIs first (so every later NodeId can be remapped), then the
//! alias table, then the node elements themselves. Aliases are resolved
//! before a node is built, so stored nodes never refer to an alias name.

use std::collections::HashMap;
use std::str::FromStr;

use aspace_store::{
    BrowseDirection, Node, NodeAttributes, StoreError, ValueSource, VALUE_RANK_SCALAR,
};
use aspace_types::{
    ns0, BuiltinType, DataValue, ExpandedNodeId, LocalizedText, NodeClass, NodeId,
    QualifiedName, Variant,
};
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node as XmlNode};
use tracing::debug;
use uuid::Uuid;

use crate::config::NodesetOptions;
use crate::error::{NodesetError, NodesetResult};

/// Reference types every nodeset may name without declaring an alias.
const WELL_KNOWN_REFERENCE_TYPES: [(&str, NodeId); 5] = [
    ("Organizes", ns0::ORGANIZES),
    ("HasTypeDefinition", ns0::HAS_TYPE_DEFINITION),
    ("HasSubtype", ns0::HAS_SUBTYPE),
    ("HasProperty", ns0::HAS_PROPERTY),
    ("HasComponent", ns0::HAS_COMPONENT),
];

/// Sections of a nodeset that carry no nodes.
const NON_NODE_SECTIONS: [&str; 5] = [
    "NamespaceUris",
    "ServerUris",
    "Models",
    "Aliases",
    "Extensions",
];

/// The result of parsing one document.
#[derive(Debug)]
pub(crate) struct ParsedNodeset {
    pub nodes: Vec<Node>,
    pub namespaces: usize,
    pub aliases: usize,
}

/// Map an element's local name to the class it defines. Both `UAVariable`
/// and `Variable` spellings are accepted.
pub(crate) fn element_class(name: &str) -> Option<NodeClass> {
    let bare = name.strip_prefix("UA").unwrap_or(name);
    NodeClass::ALL.into_iter().find(|class| class.name() == bare)
}

pub(crate) fn parse_nodeset(
    xml: &str,
    namespace_index: &mut dyn FnMut(&str) -> u16,
    options: &NodesetOptions,
) -> NodesetResult<ParsedNodeset> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    let mut ctx = Context {
        namespaces: vec![0],
        aliases: HashMap::new(),
        options,
    };

    for uri in elements(root)
        .filter(|e| e.tag_name().name() == "NamespaceUris")
        .flat_map(|section| elements(section))
        .filter(|e| e.tag_name().name() == "Uri")
    {
        let uri = uri.text().unwrap_or("").trim();
        let local = namespace_index(uri);
        debug!(uri, index = ctx.namespaces.len(), local, "nodeset namespace registered");
        ctx.namespaces.push(local);
    }

    for alias in elements(root)
        .filter(|e| e.tag_name().name() == "Aliases")
        .flat_map(|section| elements(section))
        .filter(|e| e.tag_name().name() == "Alias")
    {
        let name = required(alias, "Alias", "Alias")?;
        let target = ctx.node_id(alias.text().unwrap_or("").trim())?;
        ctx.aliases.insert(name.to_string(), target);
    }

    let mut nodes = Vec::new();
    for element in elements(root) {
        let tag = element.tag_name().name();
        if NON_NODE_SECTIONS.contains(&tag) {
            continue;
        }
        match element_class(tag) {
            Some(class) => nodes.push(ctx.parse_node(element, class)?),
            None if options.skip_unknown_elements => {
                debug!(element = tag, "skipping unsupported nodeset element");
            }
            None => return Err(NodesetError::UnknownElement(tag.to_string())),
        }
    }

    Ok(ParsedNodeset {
        nodes,
        namespaces: ctx.namespaces.len() - 1,
        aliases: ctx.aliases.len(),
    })
}

fn elements<'a, 'input>(
    node: XmlNode<'a, 'input>,
) -> impl Iterator<Item = XmlNode<'a, 'input>> {
    node.children().filter(|c| c.is_element())
}

fn child<'a, 'input>(node: XmlNode<'a, 'input>, name: &str) -> Option<XmlNode<'a, 'input>> {
    elements(node).find(|c| c.tag_name().name() == name)
}

fn required<'a>(
    node: XmlNode<'a, '_>,
    label: &str,
    attribute: &'static str,
) -> NodesetResult<&'a str> {
    node.attribute(attribute)
        .ok_or_else(|| NodesetError::MissingAttribute {
            element: label.to_string(),
            attribute,
        })
}

fn localized(node: XmlNode<'_, '_>) -> LocalizedText {
    LocalizedText::new(
        node.attribute("Locale").unwrap_or(""),
        node.text().unwrap_or("").trim(),
    )
}

/// xs:boolean accepts `1`/`0` as well as `true`/`false`.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

struct Context<'o> {
    /// Local namespace index for each index used in the document.
    namespaces: Vec<u16>,
    aliases: HashMap<String, NodeId>,
    options: &'o NodesetOptions,
}

/// Attribute reader for one node element, labelled for error messages.
struct Attributes<'a, 'input> {
    element: XmlNode<'a, 'input>,
    label: String,
}

impl<'a, 'input> Attributes<'a, 'input> {
    fn parse<T: FromStr>(&self, attribute: &'static str) -> NodesetResult<Option<T>> {
        match self.element.attribute(attribute) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| self.invalid(attribute, raw)),
        }
    }

    fn flag(&self, attribute: &'static str, default: bool) -> NodesetResult<bool> {
        match self.element.attribute(attribute) {
            None => Ok(default),
            Some(raw) => parse_flag(raw).ok_or_else(|| self.invalid(attribute, raw)),
        }
    }

    fn dimensions(&self) -> NodesetResult<Vec<u32>> {
        let Some(raw) = self.element.attribute("ArrayDimensions") else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| d.parse().map_err(|_| self.invalid("ArrayDimensions", raw)))
            .collect()
    }

    fn invalid(&self, attribute: &'static str, value: &str) -> NodesetError {
        NodesetError::InvalidAttribute {
            element: self.label.clone(),
            attribute,
            value: value.to_string(),
        }
    }
}

impl Context<'_> {
    fn remap(&self, index: u16, text: &str) -> NodesetResult<u16> {
        self.namespaces
            .get(usize::from(index))
            .copied()
            .ok_or_else(|| NodesetError::UnknownNamespace {
                index,
                value: text.to_string(),
            })
    }

    /// Parse a NodeId written in document namespace indices.
    fn node_id(&self, text: &str) -> NodesetResult<NodeId> {
        let mut id = NodeId::from_str(text)?;
        id.namespace = self.remap(id.namespace, text)?;
        Ok(id)
    }

    /// Resolve an alias, a built-in type name, a well-known reference type
    /// name, or a literal NodeId.
    fn resolve(&self, text: &str) -> NodesetResult<NodeId> {
        let text = text.trim();
        if let Some(id) = self.aliases.get(text) {
            return Ok(id.clone());
        }
        if let Some(ty) = BuiltinType::from_name(text) {
            return Ok(ty.node_id());
        }
        if let Some((_, id)) = WELL_KNOWN_REFERENCE_TYPES.iter().find(|(n, _)| *n == text) {
            return Ok(id.clone());
        }
        self.node_id(text)
    }

    fn browse_name(&self, text: &str) -> NodesetResult<QualifiedName> {
        let mut name = QualifiedName::from_str(text)?;
        name.namespace_index = self.remap(name.namespace_index, text)?;
        Ok(name)
    }

    fn parse_node(&self, element: XmlNode<'_, '_>, class: NodeClass) -> NodesetResult<Node> {
        let tag = element.tag_name().name();
        let id_text = required(element, tag, "NodeId")?;
        let attrs = Attributes {
            element,
            label: format!("<{tag} NodeId=\"{id_text}\">"),
        };

        let mut node = Node::new(class);
        node.node_id = self.node_id(id_text)?;
        node.browse_name = self.browse_name(required(element, &attrs.label, "BrowseName")?)?;
        node.write_mask = attrs.parse("WriteMask")?.unwrap_or(0);
        node.user_write_mask = attrs.parse("UserWriteMask")?.unwrap_or(0);

        let mut value = None;
        let mut inverse_name = None;
        for section in elements(element) {
            match section.tag_name().name() {
                "DisplayName" => node.display_name = localized(section),
                "Description" => node.description = localized(section),
                "InverseName" => inverse_name = Some(localized(section)),
                "References" => self.parse_references(&mut node, section)?,
                "Value" => value = self.value(&node.node_id, section)?,
                _ => {}
            }
        }
        if node.display_name.is_empty() {
            node.display_name = LocalizedText::from(node.browse_name.name.as_str());
        }

        match &mut node.attributes {
            NodeAttributes::Object(a) => {
                a.event_notifier = attrs.parse("EventNotifier")?.unwrap_or(0);
            }
            NodeAttributes::Variable(a) => {
                if let Some(data_type) = element.attribute("DataType") {
                    a.data_type = self.resolve(data_type)?;
                }
                a.value_rank = attrs.parse("ValueRank")?.unwrap_or(VALUE_RANK_SCALAR);
                a.array_dimensions = attrs.dimensions()?;
                a.access_level = attrs.parse("AccessLevel")?.unwrap_or(a.access_level);
                a.user_access_level = attrs
                    .parse("UserAccessLevel")?
                    .unwrap_or(a.user_access_level);
                a.minimum_sampling_interval =
                    attrs.parse("MinimumSamplingInterval")?.unwrap_or(0.0);
                a.historizing = attrs.flag("Historizing", false)?;
                if let Some(v) = value {
                    a.value = ValueSource::Data(DataValue::new(v));
                }
            }
            NodeAttributes::Method(a) => {
                a.executable = attrs.flag("Executable", true)?;
                a.user_executable = attrs.flag("UserExecutable", true)?;
            }
            NodeAttributes::ObjectType(a) => a.is_abstract = attrs.flag("IsAbstract", false)?,
            NodeAttributes::VariableType(a) => {
                if let Some(data_type) = element.attribute("DataType") {
                    a.data_type = self.resolve(data_type)?;
                }
                a.value_rank = attrs.parse("ValueRank")?.unwrap_or(VALUE_RANK_SCALAR);
                a.array_dimensions = attrs.dimensions()?;
                a.is_abstract = attrs.flag("IsAbstract", false)?;
                a.value = value.map(DataValue::new);
            }
            NodeAttributes::ReferenceType(a) => {
                a.is_abstract = attrs.flag("IsAbstract", false)?;
                a.symmetric = attrs.flag("Symmetric", false)?;
                a.inverse_name = inverse_name.unwrap_or_default();
            }
            NodeAttributes::DataType(a) => a.is_abstract = attrs.flag("IsAbstract", false)?,
            NodeAttributes::View(a) => {
                a.contains_no_loops = attrs.flag("ContainsNoLoops", false)?;
                a.event_notifier = attrs.parse("EventNotifier")?.unwrap_or(0);
            }
        }

        if let Some(parent) = element.attribute("ParentNodeId") {
            self.link_parent(&mut node, parent)?;
        }
        Ok(node)
    }

    fn parse_references(&self, node: &mut Node, section: XmlNode<'_, '_>) -> NodesetResult<()> {
        for reference in elements(section).filter(|e| e.tag_name().name() == "Reference") {
            let label = format!("Reference of {}", node.node_id);
            let reference_type = self.resolve(required(reference, &label, "ReferenceType")?)?;
            let is_forward = match reference.attribute("IsForward") {
                None => true,
                Some(raw) => parse_flag(raw).ok_or_else(|| NodesetError::InvalidAttribute {
                    element: label.clone(),
                    attribute: "IsForward",
                    value: raw.to_string(),
                })?,
            };
            let target = self.node_id(reference.text().unwrap_or("").trim())?;
            match node.add_reference(&reference_type, ExpandedNodeId::from(target), is_forward) {
                Ok(()) => {}
                Err(StoreError::DuplicateReference { .. }) => {
                    debug!(node = %node.node_id, %reference_type, "ignoring repeated reference");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Ensure the node points back at its parent.
    fn link_parent(&self, node: &mut Node, parent: &str) -> NodesetResult<()> {
        if !self.options.synthesize_parent_reference {
            return Ok(());
        }
        let parent = ExpandedNodeId::from(self.node_id(parent)?);
        let linked = node
            .browse(BrowseDirection::Inverse, None)
            .any(|r| *r.target == parent);
        if !linked {
            node.add_reference(&self.options.parent_reference_type, parent, false)?;
        }
        Ok(())
    }

    /// Parse the content of a `<Value>` element. An empty element is no value.
    fn value(&self, node_id: &NodeId, section: XmlNode<'_, '_>) -> NodesetResult<Option<Variant>> {
        match elements(section).next() {
            Some(inner) => self.scalar(node_id, inner).map(Some),
            None => Ok(None),
        }
    }

    fn scalar(&self, node_id: &NodeId, element: XmlNode<'_, '_>) -> NodesetResult<Variant> {
        let name = element.tag_name().name();
        let invalid = |reason: String| NodesetError::InvalidValue {
            node: node_id.clone(),
            reason,
        };

        if let Some(item) = name.strip_prefix("ListOf") {
            return elements(element)
                .map(|e| {
                    if e.tag_name().name() == item {
                        self.scalar(node_id, e)
                    } else {
                        Err(invalid(format!("<{}> inside <{name}>", e.tag_name().name())))
                    }
                })
                .collect::<NodesetResult<Vec<_>>>()
                .map(Variant::Array);
        }

        let ty = BuiltinType::from_name(name)
            .ok_or_else(|| invalid(format!("unsupported value type {name}")))?;
        let raw = element.text().unwrap_or("");
        let text = raw.trim();
        fn number<T: FromStr>(text: &str, ty: BuiltinType) -> Result<T, String> {
            text.parse()
                .map_err(|_| format!("'{text}' is not a valid {}", ty.name()))
        }

        let value = match ty {
            BuiltinType::Boolean => Variant::Boolean(
                parse_flag(text).ok_or_else(|| invalid(format!("'{text}' is not a Boolean")))?,
            ),
            BuiltinType::SByte => Variant::SByte(number(text, ty).map_err(invalid)?),
            BuiltinType::Byte => Variant::Byte(number(text, ty).map_err(invalid)?),
            BuiltinType::Int16 => Variant::Int16(number(text, ty).map_err(invalid)?),
            BuiltinType::UInt16 => Variant::UInt16(number(text, ty).map_err(invalid)?),
            BuiltinType::Int32 => Variant::Int32(number(text, ty).map_err(invalid)?),
            BuiltinType::UInt32 => Variant::UInt32(number(text, ty).map_err(invalid)?),
            BuiltinType::Int64 => Variant::Int64(number(text, ty).map_err(invalid)?),
            BuiltinType::UInt64 => Variant::UInt64(number(text, ty).map_err(invalid)?),
            BuiltinType::Float => Variant::Float(number(text, ty).map_err(invalid)?),
            BuiltinType::Double => Variant::Double(number(text, ty).map_err(invalid)?),
            BuiltinType::String => Variant::String(raw.to_string()),
            BuiltinType::DateTime => Variant::DateTime(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|e| invalid(format!("'{text}': {e}")))?
                    .with_timezone(&Utc),
            ),
            BuiltinType::Guid => {
                let text = child(element, "String")
                    .and_then(|s| s.text())
                    .unwrap_or(text)
                    .trim();
                Variant::Guid(Uuid::parse_str(text).map_err(|e| invalid(format!("'{text}': {e}")))?)
            }
            BuiltinType::ByteString => Variant::ByteString(
                hex::decode(text).map_err(|e| invalid(format!("ByteString: {e}")))?,
            ),
            BuiltinType::LocalizedText => Variant::LocalizedText(Box::new(LocalizedText::new(
                child(element, "Locale").and_then(|e| e.text()).unwrap_or(""),
                child(element, "Text").and_then(|e| e.text()).unwrap_or(""),
            ))),
            BuiltinType::QualifiedName => {
                let index = match child(element, "NamespaceIndex").and_then(|e| e.text()) {
                    Some(raw) => number::<u16>(raw.trim(), BuiltinType::UInt16).map_err(invalid)?,
                    None => 0,
                };
                let name = child(element, "Name").and_then(|e| e.text()).unwrap_or("");
                Variant::QualifiedName(Box::new(QualifiedName::new(
                    self.remap(index, name)?,
                    name,
                )))
            }
            BuiltinType::NodeId => {
                let text = child(element, "Identifier")
                    .and_then(|e| e.text())
                    .unwrap_or(text)
                    .trim();
                Variant::NodeId(Box::new(self.node_id(text)?))
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(options: &NodesetOptions) -> Context<'_> {
        let mut aliases = HashMap::new();
        aliases.insert("Motor".to_string(), NodeId::numeric(4, 1000));
        Context {
            namespaces: vec![0, 4],
            aliases,
            options,
        }
    }

    #[test]
    fn element_names_map_to_classes() {
        assert_eq!(element_class("UAVariable"), Some(NodeClass::Variable));
        assert_eq!(element_class("Variable"), Some(NodeClass::Variable));
        assert_eq!(element_class("UAView"), Some(NodeClass::View));
        assert_eq!(element_class("UAReferenceType"), Some(NodeClass::ReferenceType));
        assert_eq!(element_class("Aliases"), None);
        assert_eq!(element_class("UA"), None);
    }

    #[test]
    fn flags_accept_digits() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("yes"), None);
    }

    #[test]
    fn resolve_prefers_aliases_then_names_then_literals() {
        let options = NodesetOptions::default();
        let ctx = context(&options);
        assert_eq!(ctx.resolve("Motor").unwrap(), NodeId::numeric(4, 1000));
        assert_eq!(ctx.resolve("Double").unwrap(), NodeId::numeric(0, 11));
        assert_eq!(ctx.resolve("Organizes").unwrap(), ns0::ORGANIZES);
        assert_eq!(ctx.resolve("ns=1;s=Pump").unwrap(), NodeId::string(4, "Pump"));
        assert!(matches!(
            ctx.resolve("ns=7;i=1"),
            Err(NodesetError::UnknownNamespace { index: 7, .. })
        ));
        assert!(matches!(ctx.resolve("NotAType"), Err(NodesetError::Type(_))));
    }

    #[test]
    fn browse_names_are_remapped() {
        let options = NodesetOptions::default();
        let ctx = context(&options);
        assert_eq!(
            ctx.browse_name("1:Pump").unwrap(),
            QualifiedName::new(4, "Pump")
        );
        assert_eq!(ctx.browse_name("Server").unwrap(), QualifiedName::new(0, "Server"));
    }

    #[test]
    fn namespace_callback_sees_each_uri_in_order() {
        let xml = r#"<UANodeSet>
            <NamespaceUris><Uri>urn:a</Uri><Uri>urn:b</Uri></NamespaceUris>
            <UAObject NodeId="ns=2;i=1" BrowseName="2:B"/>
        </UANodeSet>"#;
        let mut seen = Vec::new();
        let mut register = |uri: &str| {
            seen.push(uri.to_string());
            10 + seen.len() as u16
        };
        let parsed = parse_nodeset(xml, &mut register, &NodesetOptions::default()).unwrap();
        assert_eq!(seen, vec!["urn:a", "urn:b"]);
        assert_eq!(parsed.namespaces, 2);
        assert_eq!(parsed.nodes[0].node_id, NodeId::numeric(12, 1));
        assert_eq!(parsed.nodes[0].browse_name.namespace_index, 12);
    }
}
