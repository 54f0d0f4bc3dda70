//! Entity representation.
//!
//! Engines and the upsert algorithm never look inside an entity type
//! directly. They see its serde representation, a [`Document`], which acts
//! as the entity's schema description: fields are addressed by their
//! serialized names.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{BackendError, StorageResult};

/// A serialized entity: field name to JSON value.
pub type Document = Map<String, Value>;

/// An application record that can be stored through an engine.
///
/// Implemented for every type with the right serde and thread-safety bounds.
/// The entity must serialize to a JSON object.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Serializes the entity into a document.
    fn to_document(&self) -> StorageResult<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(BackendError::SerializationError {
                message: format!("entity serialized to a non-object value: {}", other),
            }
            .into()),
        }
    }

    /// Deserializes an entity from a document.
    fn from_document(document: Document) -> StorageResult<Self> {
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    /// Returns the serialized value of a top-level field.
    ///
    /// Fields serialized as `null` are reported as absent.
    fn field_value(&self, field: &str) -> StorageResult<Option<Value>> {
        let mut document = self.to_document()?;
        Ok(document.remove(field).filter(|v| !v.is_null()))
    }
}

impl<T> Entity for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A partial record applied as a shallow merge by `update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(Document);

impl Patch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a patch carrying every field of an entity.
    pub fn from_entity<T: Entity>(entity: &T) -> StorageResult<Self> {
        Ok(Self(entity.to_document()?))
    }

    /// Sets a field.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns true if the patch sets no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the patched fields.
    pub fn fields(&self) -> &Document {
        &self.0
    }

    /// Applies the patch onto a document, replacing top-level fields.
    pub fn apply_to(&self, document: &mut Document) {
        for (field, value) in &self.0 {
            document.insert(field.clone(), value.clone());
        }
    }
}

impl From<Document> for Patch {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

/// Summary returned by `delete`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Number of records removed.
    pub deleted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        email: String,
        nickname: Option<String>,
        logins: u32,
    }

    fn account() -> Account {
        Account {
            email: "ada@example.com".to_string(),
            nickname: None,
            logins: 3,
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let doc = account().to_document().unwrap();
        assert_eq!(doc["email"], json!("ada@example.com"));
        assert_eq!(Account::from_document(doc).unwrap(), account());
    }

    #[test]
    fn test_field_value_treats_null_as_absent() {
        let account = account();
        assert_eq!(account.field_value("logins").unwrap(), Some(json!(3)));
        assert_eq!(account.field_value("nickname").unwrap(), None);
        assert_eq!(account.field_value("missing").unwrap(), None);
    }

    #[test]
    fn test_non_object_entity_is_rejected() {
        let err = 42_u32.to_document().unwrap_err();
        assert!(err.to_string().contains("non-object"));
    }

    #[test]
    fn test_patch_shallow_merge() {
        let mut doc = account().to_document().unwrap();
        Patch::new()
            .set("logins", 4)
            .set("nickname", "ada")
            .apply_to(&mut doc);
        assert_eq!(doc["logins"], json!(4));
        assert_eq!(doc["nickname"], json!("ada"));
        assert_eq!(doc["email"], json!("ada@example.com"));
    }
}
