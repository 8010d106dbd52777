//! Entity <-> record mapping
//!
//! Writes serialize an entity into a [`Record`]. Reads copy every field of a
//! stored record onto a fresh default instance of the requested type, so
//! fields the record lacks keep their default value. Fields the type does
//! not declare are left to serde: structs ignore them, maps keep them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::key::Record;

/// Serialize an entity into the record that will be stored.
pub fn to_record<T: Serialize>(entity: &T, store: &str) -> Result<Record> {
    match serde_json::to_value(entity)? {
        Value::Object(record) => Ok(record),
        other => Err(Error::NotARecord {
            store: store.to_string(),
            found: json_type(&other),
        }),
    }
}

/// Shallow-copy `record` onto `T::default()`.
pub fn map_entity<T>(record: Record) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let mut fields = match serde_json::to_value(T::default())? {
        Value::Object(fields) => fields,
        // Not a struct-like type: take the record as a whole
        _ => return Ok(serde_json::from_value(Value::Object(record))?),
    };

    // Every stored field wins, including ones the default skips when serialized
    fields.extend(record);

    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
        active: bool,
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_fields_keep_defaults() {
        let user: User = map_entity(record(json!({"id": 1, "name": "Ann"}))).unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "Ann".into(),
                active: false
            }
        );
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let user: User = map_entity(record(json!({"id": 2, "legacy": [1, 2]}))).unwrap();
        assert_eq!(user.id, 2);
        assert_eq!(user.name, "");
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Contact {
        id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    }

    #[test]
    fn test_fields_skipped_by_default_are_copied() {
        let contact: Contact =
            map_entity(record(json!({"id": 1, "email": "a@b.example"}))).unwrap();
        assert_eq!(
            contact,
            Contact {
                id: 1,
                email: Some("a@b.example".into())
            }
        );
    }

    #[test]
    fn test_map_types_keep_every_field() {
        let stored = record(json!({"id": 1, "name": "Ann"}));

        let as_record: Record = map_entity(stored.clone()).unwrap();
        assert_eq!(as_record, stored);

        let as_map: std::collections::HashMap<String, Value> = map_entity(stored).unwrap();
        assert_eq!(as_map.len(), 2);
        assert_eq!(as_map["name"], json!("Ann"));
    }

    #[test]
    fn test_mismatched_field_type_is_error() {
        let result: Result<User> = map_entity(record(json!({"id": "not-a-number"})));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_non_object_entity_rejected() {
        let err = to_record(&42, "users").unwrap_err();
        assert!(matches!(
            err,
            Error::NotARecord {
                found: "a number",
                ..
            }
        ));
    }

    #[test]
    fn test_to_record() {
        let user = User {
            id: 1,
            name: "Ann".into(),
            active: true,
        };
        assert_eq!(
            to_record(&user, "users").unwrap(),
            record(json!({"id": 1, "name": "Ann", "active": true}))
        );
    }
}
