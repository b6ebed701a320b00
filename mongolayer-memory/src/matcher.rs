//! Query filter evaluation for in-memory documents.
//!
//! Supports implicit equality, the comparison operators (`$eq`, `$ne`, `$gt`, `$gte`,
//! `$lt`, `$lte`, `$in`, `$nin`, `$exists`), the logical operators (`$and`, `$or`,
//! `$nor`) and dotted paths into embedded documents and arrays. A field holding an
//! array matches a condition if the array itself or any of its elements does.

use std::cmp::Ordering;

use bson::{Bson, DateTime, Document, oid::ObjectId};

use mongolayer_core::error::DriverError;

use crate::error::bad_value;

/// Comparable view of a BSON value.
///
/// Numeric types are normalized to `f64` so that `1`, `1i64` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    /// Embedded documents compare field by field, in order.
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Any other type, compared by exact equality only.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(f64::from(*value)),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted `path` in `document`. Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Returns `true` if `document` satisfies `filter`.
///
/// # Errors
///
/// Returns a bad-value [`DriverError`] for unknown operators or malformed operands.
pub(crate) fn matches(document: &Document, filter: &Document) -> Result<bool, DriverError> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => logical_operands(key, condition)?
                .iter()
                .try_fold(true, |acc, clause| Ok::<_, DriverError>(acc && matches(document, clause)?))?,
            "$or" => logical_operands(key, condition)?
                .iter()
                .try_fold(false, |acc, clause| Ok::<_, DriverError>(acc || matches(document, clause)?))?,
            "$nor" => !logical_operands(key, condition)?
                .iter()
                .try_fold(false, |acc, clause| Ok::<_, DriverError>(acc || matches(document, clause)?))?,
            operator if operator.starts_with('$') => {
                return Err(bad_value(format!("unknown top level operator: {operator}")));
            }
            path => matches_condition(lookup(document, path), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn logical_operands<'a>(operator: &str, operand: &'a Bson) -> Result<Vec<&'a Document>, DriverError> {
    let Bson::Array(clauses) = operand else {
        return Err(bad_value(format!("{operator} must be an array")));
    };

    if clauses.is_empty() {
        return Err(bad_value(format!("{operator} must be a nonempty array")));
    }

    clauses
        .iter()
        .map(|clause| match clause {
            Bson::Document(document) => Ok(document),
            _ => Err(bad_value(format!("{operator} argument's entries must be objects"))),
        })
        .collect()
}

fn is_operator_condition(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(document) if document.keys().next().is_some_and(|k| k.starts_with('$')) => {
            Some(document)
        }
        _ => None,
    }
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> Result<bool, DriverError> {
    let Some(operators) = is_operator_condition(condition) else {
        return Ok(matches_eq(value, condition));
    };

    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => matches_eq(value, operand),
            "$ne" => !matches_eq(value, operand),
            "$gt" => matches_ordering(value, operand, |o| o == Ordering::Greater),
            "$gte" => matches_ordering(value, operand, |o| o != Ordering::Less),
            "$lt" => matches_ordering(value, operand, |o| o == Ordering::Less),
            "$lte" => matches_ordering(value, operand, |o| o != Ordering::Greater),
            "$in" => in_operand(operator, operand)?
                .iter()
                .any(|candidate| matches_eq(value, candidate)),
            "$nin" => !in_operand(operator, operand)?
                .iter()
                .any(|candidate| matches_eq(value, candidate)),
            "$exists" => value.is_some() == is_truthy(operand),
            other => return Err(bad_value(format!("unknown operator: {other}"))),
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn in_operand<'a>(operator: &str, operand: &'a Bson) -> Result<&'a [Bson], DriverError> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(bad_value(format!("{operator} needs an array"))),
    }
}

pub(crate) fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn matches_eq(value: Option<&Bson>, target: &Bson) -> bool {
    let target = Comparable::from(target);

    match value {
        None => target == Comparable::Null,
        Some(array @ Bson::Array(items)) => {
            Comparable::from(array) == target
                || items.iter().any(|item| Comparable::from(item) == target)
        }
        Some(value) => Comparable::from(value) == target,
    }
}

fn matches_ordering(value: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let target = Comparable::from(target);
    let compare = |candidate: &Bson| {
        Comparable::from(candidate)
            .partial_cmp(&target)
            .is_some_and(&accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(compare),
        Some(value) => compare(value),
    }
}
