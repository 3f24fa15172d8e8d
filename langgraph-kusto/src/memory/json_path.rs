//! JSON-path extraction for index configs.
//!
//! Paths are dot-separated field names, each optionally followed by `[n]` (negative counts
//! from the end) or `[*]` (every element, in array order): `metadata.title`,
//! `authors[0].name`, `sections[*].paragraphs[*].text`.

use serde_json::Value;

use super::store::StoreError;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Field(String),
    Index(i64),
    Wildcard,
}

/// Parses `path` into tokens. Malformed brackets or non-integer indices are errors.
pub fn parse_path(path: &str) -> Result<Vec<PathToken>, StoreError> {
    let invalid = || StoreError::InvalidIndexPath(path.to_string());
    let mut tokens = Vec::new();
    for segment in path.split('.') {
        let (name, mut rest) = match segment.find('[') {
            Some(i) => (&segment[..i], &segment[i..]),
            None => (segment, ""),
        };
        if name.is_empty() && rest.is_empty() {
            return Err(invalid());
        }
        if !name.is_empty() {
            tokens.push(PathToken::Field(name.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(invalid)?;
            if !rest.starts_with('[') {
                return Err(invalid());
            }
            let inner = &rest[1..close];
            if inner == "*" {
                tokens.push(PathToken::Wildcard);
            } else {
                let idx = inner.trim().parse::<i64>().map_err(|_| invalid())?;
                tokens.push(PathToken::Index(idx));
            }
            rest = &rest[close + 1..];
        }
    }
    Ok(tokens)
}

/// Values reached by following `tokens` from `data`. Missing fields, out-of-range indices and
/// type mismatches yield no values rather than an error.
pub fn traverse<'a>(data: &'a Value, tokens: &[PathToken]) -> Vec<&'a Value> {
    let Some((head, rest)) = tokens.split_first() else {
        return vec![data];
    };
    match head {
        PathToken::Wildcard => match data {
            Value::Array(items) => items.iter().flat_map(|item| traverse(item, rest)).collect(),
            _ => Vec::new(),
        },
        PathToken::Index(i) => match data {
            Value::Array(items) => {
                let len = items.len() as i64;
                let idx = if *i < 0 { len + i } else { *i };
                if (0..len).contains(&idx) {
                    traverse(&items[idx as usize], rest)
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        },
        PathToken::Field(name) => match data.get(name.as_str()) {
            Some(child) => traverse(child, rest),
            None => Vec::new(),
        },
    }
}

/// Text of an extracted value: strings as-is, everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `(path, text)` for every value found at each path, paths in order.
pub fn extract_fields(value: &Value, paths: &[String]) -> Result<Vec<(String, String)>, StoreError> {
    let mut out = Vec::new();
    for path in paths {
        let tokens = parse_path(path)?;
        for found in traverse(value, &tokens) {
            out.push((path.clone(), value_text(found)));
        }
    }
    Ok(out)
}
