//! Company knowledge base flattening.
//!
//! A company uploads arbitrary JSON. Retrieval works over flat documents, one
//! per leaf value, named by the path that reaches it: object keys joined with
//! `/`, list positions appended as `[i]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One retrievable leaf of the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    /// `"<path>: <value>"`
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    documents: Vec<Document>,
}

impl KnowledgeBase {
    pub fn from_json(value: &Value) -> Self {
        let mut documents = Vec::new();
        flatten(value, String::new(), &mut documents);
        Self { documents }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn flatten(node: &Value, path: String, out: &mut Vec<Document>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}/{}", path, key)
                };
                flatten(value, child, out);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                flatten(item, format!("{}[{}]", path, idx), out);
            }
        }
        // An unset knowledge base has nothing to retrieve.
        Value::Null if path.is_empty() => {}
        leaf => {
            let rendered = match leaf {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push(Document {
                text: format!("{}: {}", path, rendered),
                path,
            });
        }
    }
}
