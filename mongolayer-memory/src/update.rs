//! Application of update documents to stored documents.
//!
//! An update is either a set of modifiers (`$set`, `$unset`, `$inc`, `$rename`) or a
//! replacement document. `_id` is immutable in both forms.

use bson::{Bson, Document, oid::ObjectId};

use mongolayer_core::{document::is_operator_document, error::DriverError};

use crate::{
    error::{IMMUTABLE_FIELD, PATH_NOT_VIABLE, failed_to_parse, type_mismatch},
    matcher::lookup,
};

const ID: &str = "_id";

/// Applies `update` to `document` in place.
///
/// On error `document` is left unchanged.
pub(crate) fn apply(document: &mut Document, update: &Document) -> Result<(), DriverError> {
    let mut updated = if is_operator_document(update) {
        let mut updated = document.clone();
        apply_modifiers(&mut updated, update)?;
        updated
    } else {
        replacement(document.get(ID), update)?
    };

    if updated.get(ID) != document.get(ID) {
        return Err(DriverError::server(
            IMMUTABLE_FIELD,
            "Performing an update on the path '_id' would modify the immutable field '_id'",
        ));
    }

    std::mem::swap(document, &mut updated);

    Ok(())
}

/// Builds the document inserted by an upsert that matched nothing.
///
/// Equality conditions of `selector` seed the document, then `update` is applied. An
/// `_id` is generated if neither provides one.
pub(crate) fn upsert_document(selector: &Document, update: &Document) -> Result<Document, DriverError> {
    let mut seed = Document::new();

    for (key, condition) in selector {
        let is_operator = matches!(
            condition,
            Bson::Document(inner) if inner.keys().next().is_some_and(|k| k.starts_with('$'))
        );

        if !key.starts_with('$') && !is_operator {
            set_path(&mut seed, key, condition.clone())?;
        }
    }

    let mut document = if is_operator_document(update) {
        apply_modifiers(&mut seed, update)?;
        seed
    } else {
        replacement(seed.get(ID), update)?
    };

    if !document.contains_key(ID) {
        document = with_generated_id(document);
    }

    Ok(document)
}

/// Returns `document` with a fresh `_id` as its first field.
pub(crate) fn with_generated_id(document: Document) -> Document {
    std::iter::once((ID.to_string(), Bson::ObjectId(ObjectId::new())))
        .chain(document)
        .collect()
}

fn replacement(id: Option<&Bson>, update: &Document) -> Result<Document, DriverError> {
    let Some(id) = id else {
        return Ok(update.clone());
    };

    if update.get(ID).is_some_and(|given| given != id) {
        return Err(DriverError::server(
            IMMUTABLE_FIELD,
            "the _id field cannot be changed by a replacement",
        ));
    }

    Ok(std::iter::once((ID.to_string(), id.clone()))
        .chain(
            update
                .iter()
                .filter(|(k, _)| *k != ID)
                .map(|(k, v)| (k.clone(), v.clone())),
        )
        .collect())
}

fn apply_modifiers(document: &mut Document, update: &Document) -> Result<(), DriverError> {
    for (modifier, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(failed_to_parse(format!(
                "Modifiers operate on fields but we found type {:?} instead",
                fields.element_type()
            )));
        };

        for (path, value) in fields {
            match modifier.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => {
                    remove_path(document, path);
                }
                "$inc" => increment(document, path, value)?,
                "$rename" => {
                    let Bson::String(target) = value else {
                        return Err(failed_to_parse("The 'to' field for $rename must be a string"));
                    };
                    if let Some(moved) = remove_path(document, path) {
                        set_path(document, target, moved)?;
                    }
                }
                other => return Err(failed_to_parse(format!("Unknown modifier: {other}"))),
            }
        }
    }

    Ok(())
}

fn increment(document: &mut Document, path: &str, by: &Bson) -> Result<(), DriverError> {
    if !is_number(by) {
        return Err(type_mismatch("Cannot increment with non-numeric argument"));
    }

    let sum = match lookup(document, path) {
        None => by.clone(),
        Some(current) => add(current, by).ok_or_else(|| {
            type_mismatch(format!(
                "Cannot apply $inc to a value of non-numeric type {:?}",
                current.element_type()
            ))
        })?,
    };

    set_path(document, path, sum)
}

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn add(a: &Bson, b: &Bson) -> Option<Bson> {
    Some(match (a, b) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(i64::from(*a) + i64::from(*b))),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).checked_add(*b)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(i64::from(*b))?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b)?),
        (Bson::Double(a), b) => Bson::Double(a + as_f64(b)?),
        (a, Bson::Double(b)) => Bson::Double(as_f64(a)? + b),
        _ => return None,
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Sets a dotted `path`, creating intermediate documents as needed.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<(), DriverError> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                other => Err(DriverError::server(
                    PATH_NOT_VIABLE,
                    format!(
                        "Cannot create field '{rest}' in element {{{head}: {other}}}"
                    ),
                )),
            }
        }
    }
}

fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head)? {
            Bson::Document(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}
