/// # Matcher Module
///
/// Filter matching and update application for the in-memory driver.
/// Covers the subset of the query language the shell and tests use:
/// equality on dotted fields (fanning out through arrays of subdocuments),
/// comparison operators, `$in`/`$nin`, `$exists`, and the `$and`/`$or`/`$nor`
/// combinators. Updates support `$set`, `$unset` and `$inc`.
///
/// Evaluation never short-circuits, so an unknown operator is reported even
/// when an earlier clause already failed to match.

use super::{DriverError, DriverResult};
use mongodb::bson::{Bson, Document};
use std::cmp::Ordering;

/// Returns whether `document` satisfies `filter`.
pub fn matches(document: &Document, filter: &Document) -> DriverResult<bool> {
    let mut matched = true;
    for (key, condition) in filter {
        let clause = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in clauses(key, condition)? {
                    all &= matches(document, sub)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in clauses(key, condition)? {
                    any |= matches(document, sub)?;
                }
                any
            }
            "$nor" => {
                let mut any = false;
                for sub in clauses(key, condition)? {
                    any |= matches(document, sub)?;
                }
                !any
            }
            op if op.starts_with('$') => {
                return Err(DriverError::BadValue(format!(
                    "unknown top level operator: {op}"
                )))
            }
            path => field_matches(&lookup_all(document, path), condition)?,
        };
        matched &= clause;
    }
    Ok(matched)
}

/// Rejects filters with unknown operators or malformed combinators.
pub fn check_filter(filter: &Document) -> DriverResult<()> {
    matches(&Document::new(), filter).map(|_| ())
}

fn clauses<'a>(op: &str, condition: &'a Bson) -> DriverResult<Vec<&'a Document>> {
    let invalid = || DriverError::BadValue(format!("{op} must be a nonempty array of documents"));
    let Bson::Array(items) = condition else {
        return Err(invalid());
    };
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(invalid()),
        })
        .collect()
}

fn is_operator_expression(condition: &Bson) -> bool {
    match condition {
        Bson::Document(doc) => doc.keys().next().map_or(false, |k| k.starts_with('$')),
        _ => false,
    }
}

/// `values` holds every value the filter path resolves to; empty when the
/// field is missing.
fn field_matches(values: &[&Bson], condition: &Bson) -> DriverResult<bool> {
    let Bson::Document(ops) = condition else {
        return Ok(equals(values, condition));
    };
    if !is_operator_expression(condition) {
        return Ok(equals(values, condition));
    }

    let mut matched = true;
    for (op, operand) in ops {
        let result = match op.as_str() {
            "$eq" => equals(values, operand),
            "$ne" => !equals(values, operand),
            "$gt" => compares(values, operand, |o| o == Ordering::Greater),
            "$gte" => compares(values, operand, |o| o != Ordering::Less),
            "$lt" => compares(values, operand, |o| o == Ordering::Less),
            "$lte" => compares(values, operand, |o| o != Ordering::Greater),
            "$in" => in_list(op, values, operand)?,
            "$nin" => !in_list(op, values, operand)?,
            "$exists" => !values.is_empty() == truthy(operand),
            _ => return Err(DriverError::BadValue(format!("unknown operator: {op}"))),
        };
        matched &= result;
    }
    Ok(matched)
}

fn in_list(op: &str, values: &[&Bson], operand: &Bson) -> DriverResult<bool> {
    match operand {
        Bson::Array(candidates) => Ok(candidates.iter().any(|c| equals(values, c))),
        _ => Err(DriverError::BadValue(format!("{op} needs an array"))),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => as_f64(other).map_or(true, |n| n != 0.0),
    }
}

/// Equality with the query language's rules: a missing field equals `null`
/// and an array field equals any of its elements.
fn equals(values: &[&Bson], target: &Bson) -> bool {
    if values.is_empty() {
        return matches!(target, Bson::Null);
    }
    values.iter().any(|value| match value {
        v if values_equal(v, target) => true,
        Bson::Array(items) => items.iter().any(|item| values_equal(item, target)),
        _ => false,
    })
}

fn compares(values: &[&Bson], target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    values.iter().any(|value| match value {
        Bson::Array(items) if !matches!(target, Bson::Array(_)) => items
            .iter()
            .any(|item| compare(item, target).map_or(false, &accept)),
        v => compare(v, target).map_or(false, &accept),
    })
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Value equality where int32, int64 and double compare numerically.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
        }
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(va, vb)| values_equal(va, vb))
        }
        _ => match (as_i64(a), as_i64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => match (as_f64(a), as_f64(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
        },
    }
}

/// Ordering between values of comparable types; `None` across types.
fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        _ => None,
    }
}

/// Collects every value a dotted filter path reaches.
///
/// A numeric segment indexes into an array; any other segment applied to an
/// array is resolved against each subdocument element.
pub fn lookup_all<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();
    if let Some(first) = document.get(segments[0]) {
        collect(first, &segments[1..], &mut found);
    }
    found
}

fn collect<'a>(value: &'a Bson, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((segment, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };
    match value {
        Bson::Document(inner) => {
            if let Some(next) = inner.get(*segment) {
                collect(next, rest, found);
            }
        }
        Bson::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(item) = items.get(index) {
                    collect(item, rest, found);
                }
            }
            Err(_) => {
                for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                    collect(item, segments, found);
                }
            }
        },
        _ => {}
    }
}

/// Resolves a dotted path to a single value; numeric segments index into arrays.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
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

/// Rejects update specifications that are empty or carry non-operator keys.
pub fn check_update(update: &Document) -> DriverResult<()> {
    if update.is_empty() {
        return Err(DriverError::BadValue("update document must not be empty".to_string()));
    }
    for (op, fields) in update {
        if !op.starts_with('$') {
            return Err(DriverError::BadValue(
                "update document requires atomic operators".to_string(),
            ));
        }
        if !matches!(op.as_str(), "$set" | "$unset" | "$inc") {
            return Err(DriverError::BadValue(format!("Unknown modifier: {op}")));
        }
        if !matches!(fields, Bson::Document(_)) {
            return Err(DriverError::BadValue(format!(
                "Modifiers operate on fields but we found a non-document value for {op}"
            )));
        }
    }
    Ok(())
}

/// Applies `update` to `document` and returns whether anything changed.
///
/// On error the document may be partially updated; callers apply updates to
/// a copy.
pub fn apply_update(document: &mut Document, update: &Document) -> DriverResult<bool> {
    check_update(update)?;
    let mut changed = false;
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            continue;
        };
        for (path, operand) in fields {
            if path == "_id" || path.starts_with("_id.") {
                return Err(DriverError::BadValue(format!(
                    "Performing an update on the path '{path}' would modify the immutable field '_id'"
                )));
            }
            changed |= match op.as_str() {
                "$set" => set_path(document, path, operand.clone())?,
                "$unset" => unset_path(document, path),
                "$inc" => {
                    let current = lookup(document, path).cloned();
                    let next = increment(path, current.as_ref(), operand)?;
                    set_path(document, path, next)?
                }
                _ => false,
            };
        }
    }
    Ok(changed)
}

fn increment(path: &str, current: Option<&Bson>, by: &Bson) -> DriverResult<Bson> {
    if as_f64(by).is_none() {
        return Err(DriverError::BadValue(format!(
            "Cannot increment with non-numeric argument: {{{path}: {by}}}"
        )));
    }
    let Some(current) = current else {
        return Ok(by.clone());
    };
    let sum = match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(i64::from(*a) + i64::from(*b))),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).saturating_add(*b)),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.saturating_add(i64::from(*b))),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.saturating_add(*b)),
        (a, b) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Bson::Double(x + y),
            _ => {
                return Err(DriverError::BadValue(format!(
                    "Cannot apply $inc to a value of non-numeric type at '{path}'"
                )))
            }
        },
    };
    Ok(sum)
}

fn cannot_create(field: &str, element: &str) -> DriverError {
    DriverError::BadValue(format!("Cannot create field '{field}' in element '{element}'"))
}

fn split_segment(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((segment, rest)) => (segment, Some(rest)),
        None => (path, None),
    }
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DriverResult<bool> {
    match split_segment(path) {
        (field, None) => {
            let changed = document.get(field).map_or(true, |old| old != &value);
            document.insert(field, value);
            Ok(changed)
        }
        (head, Some(rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(child) => set_nested(child, head, rest, value),
                None => Err(cannot_create(rest, head)),
            }
        }
    }
}

/// Sets `path` below `target`, the value stored under `element`.
///
/// Numeric segments address array elements; an index past the end pads the
/// array with nulls.
fn set_nested(target: &mut Bson, element: &str, path: &str, value: Bson) -> DriverResult<bool> {
    match target {
        Bson::Document(inner) => set_path(inner, path, value),
        Bson::Array(items) => {
            let (segment, rest) = split_segment(path);
            let index = segment
                .parse::<usize>()
                .map_err(|_| cannot_create(path, element))?;
            if index >= items.len() {
                items.resize(index + 1, Bson::Null);
                if rest.is_some() {
                    items[index] = Bson::Document(Document::new());
                }
            }
            match rest {
                None => {
                    let changed = items[index] != value;
                    items[index] = value;
                    Ok(changed)
                }
                Some(rest) => set_nested(&mut items[index], segment, rest, value),
            }
        }
        _ => Err(cannot_create(path, element)),
    }
}

fn unset_path(document: &mut Document, path: &str) -> bool {
    match split_segment(path) {
        (field, None) => document.remove(field).is_some(),
        (head, Some(rest)) => match document.get_mut(head) {
            Some(child) => unset_nested(child, rest),
            None => false,
        },
    }
}

/// Unsetting an array element replaces it with null, keeping positions stable.
fn unset_nested(target: &mut Bson, path: &str) -> bool {
    match target {
        Bson::Document(inner) => unset_path(inner, path),
        Bson::Array(items) => {
            let (segment, rest) = split_segment(path);
            let Some(item) = segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) else {
                return false;
            };
            match rest {
                None => {
                    let changed = !matches!(item, Bson::Null);
                    *item = Bson::Null;
                    changed
                }
                Some(rest) => unset_nested(item, rest),
            }
        }
        _ => false,
    }
}
