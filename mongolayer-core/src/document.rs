//! Conversions between caller types and BSON documents, plus the client-side checks
//! applied to documents before they are handed to the engine.
//!
//! The client layer never interprets document contents beyond these checks.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{ClientError, ClientResult, DriverError};

/// Encodes `value` as a document.
///
/// # Errors
///
/// A value that cannot be represented as a document is a defect in the caller, and is
/// reported as [`ClientError::Programming`].
pub fn encode<T: Serialize + ?Sized>(value: &T) -> ClientResult<Document> {
    match serialize_to_bson(value) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(ClientError::Programming(format!(
            "value encodes as {:?}, not as a document",
            other.element_type()
        ))),
        Err(err) => Err(ClientError::Programming(err.to_string())),
    }
}

/// Decodes `document` into an owned `T`.
pub fn decode<T: DeserializeOwned>(document: &Document) -> ClientResult<T> {
    Ok(deserialize_from_bson(Bson::Document(document.clone()))?)
}

/// Extension methods for serde types stored as documents.
pub trait DocumentExt: Serialize + DeserializeOwned {
    fn to_document(&self) -> ClientResult<Document> {
        encode(self)
    }

    fn from_document(document: &Document) -> ClientResult<Self> {
        decode(document)
    }
}

impl<T: Serialize + DeserializeOwned> DocumentExt for T {}

/// Size of `document` once serialized.
pub fn encoded_len(document: &Document) -> ClientResult<usize> {
    let mut buffer = Vec::new();
    document
        .to_writer(&mut buffer)
        .map_err(|err| ClientError::Programming(err.to_string()))?;

    Ok(buffer.len())
}

/// Checks that no key, at any depth, starts with `$` or contains `.`.
pub fn validate_keys(document: &Document) -> Result<(), DriverError> {
    for (key, value) in document {
        if key.starts_with('$') {
            return Err(DriverError::invalid_document(format!(
                "key '{key}' must not start with '$'"
            )));
        }
        if key.contains('.') {
            return Err(DriverError::invalid_document(format!(
                "key '{key}' must not contain '.'"
            )));
        }
        validate_value(value)?;
    }

    Ok(())
}

fn validate_value(value: &Bson) -> Result<(), DriverError> {
    match value {
        Bson::Document(document) => validate_keys(document),
        Bson::Array(items) => items.iter().try_for_each(validate_value),
        _ => Ok(()),
    }
}

/// Returns `true` if every top-level key is an update operator such as `$set`.
pub fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

/// Rejects update documents that mix operators and plain fields.
pub fn validate_update(update: &Document) -> Result<(), DriverError> {
    let operators = update.keys().filter(|key| key.starts_with('$')).count();

    if operators > 0 && operators < update.len() {
        return Err(DriverError::invalid_document(
            "update document must contain either only operators or only fields",
        ));
    }

    if operators == 0 {
        validate_keys(update)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        hello: String,
        count: i32,
    }

    #[test]
    fn test_encode_and_decode_struct() {
        let greeting = Greeting {
            hello: "world".into(),
            count: 2,
        };

        let document = greeting.to_document().unwrap();
        assert_eq!(document, doc! { "hello": "world", "count": 2 });
        assert_eq!(Greeting::from_document(&document).unwrap(), greeting);
    }

    #[test]
    fn test_encoding_a_scalar_is_a_programming_error() {
        let err = encode(&42_i32).unwrap_err();

        assert!(err.is_programming_error());
    }

    #[test]
    fn test_decode_mismatch_is_serialization_error() {
        let err = decode::<Greeting>(&doc! { "hello": 1 }).unwrap_err();

        assert!(matches!(err, ClientError::Serialization(_)));
    }

    #[test]
    fn test_validate_keys() {
        assert!(validate_keys(&doc! { "a": { "b": [ { "c": 1 } ] } }).is_ok());
        assert!(validate_keys(&doc! { "$set": 1 }).is_err());
        assert!(validate_keys(&doc! { "a.b": 1 }).is_err());
        assert!(validate_keys(&doc! { "a": [ { "$x": 1 } ] }).is_err());
    }

    #[test]
    fn test_validate_update() {
        assert!(validate_update(&doc! { "$set": { "a": 1 }, "$inc": { "b": 1 } }).is_ok());
        assert!(validate_update(&doc! { "a": 1, "b": 2 }).is_ok());
        assert!(validate_update(&doc! { "$set": { "a": 1 }, "b": 2 }).is_err());
        assert!(is_operator_document(&doc! { "$set": { "a": 1 } }));
        assert!(!is_operator_document(&doc! {}));
    }

    #[test]
    fn test_encoded_len() {
        // int32 length + one int32 element ("a\0" + 4 bytes + type byte) + terminator
        assert_eq!(encoded_len(&doc! { "a": 1 }).unwrap(), 4 + 1 + 2 + 4 + 1);
    }
}
