//! Tree-to-document conversion.

#[cfg(test)]
use mockall::automock;
use serde_json::Map;
use serde_json::Value;

use crate::DataNode;
use crate::Document;
use crate::Result;

/// Serializes a data tree snapshot into the canonical document form.
#[cfg_attr(test, automock)]
pub trait DocumentWriter: Send + Sync + 'static {
    /// `None` (nothing read) must yield an empty document, not an error.
    fn write<'a>(
        &self,
        data: Option<&'a DataNode>,
    ) -> Result<Document>;
}

/// Schemaless JSON writer.
///
/// Leaves become strings, containers become objects, and repeated child
/// names collapse into an array. An unnamed node (a partition root) is
/// written as its bare member object.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDocumentWriter;

impl JsonDocumentWriter {
    fn node_value(node: &DataNode) -> Value {
        if let Some(value) = &node.value {
            return Value::String(value.clone());
        }

        let mut members = Map::new();
        for child in &node.children {
            let value = Self::node_value(child);
            match members.get_mut(&child.name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    members.insert(child.name.clone(), value);
                }
            }
        }
        Value::Object(members)
    }
}

impl DocumentWriter for JsonDocumentWriter {
    fn write<'a>(
        &self,
        data: Option<&'a DataNode>,
    ) -> Result<Document> {
        let Some(node) = data else {
            return Ok(Document::empty());
        };

        let value = if node.name.is_empty() {
            Self::node_value(node)
        } else {
            let mut wrapper = Map::new();
            wrapper.insert(node.name.clone(), Self::node_value(node));
            Value::Object(wrapper)
        };
        Ok(Document::from(value))
    }
}
