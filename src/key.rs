//! Cache key codec for query identity.

use std::fmt::Debug;

use serde_json::Value;

/// Separator between cache key parts in the serialized form.
///
/// A control character that cannot appear unescaped in JSON output, so
/// joined parts can never collide with each other.
const PART_SEPARATOR: char = '\u{1f}';

/// Cache key for one logical query + variables combination.
///
/// A key is an ordered tuple of the operation identity, the canonically
/// serialized variables, and any number of extra opaque parts (e.g. a
/// fetch-policy discriminator). Two keys built from value-equal inputs are
/// equal regardless of the insertion order of the variable object's keys.
///
/// Keys are only ever used as map keys; they are never mutated.
///
/// # Example
///
/// ```ignore
/// let a = CacheKey::new("GetCharacter", Some(&json!({"id": "1", "lang": "en"})), &[]);
/// let b = CacheKey::new("GetCharacter", Some(&json!({"lang": "en", "id": "1"})), &[]);
/// assert_eq!(a.serialize(), b.serialize());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    variables: String,
    extra: Vec<String>,
}

impl CacheKey {
    /// Build a cache key from an operation identity, optional variables,
    /// and extra opaque key parts.
    ///
    /// Variables are canonicalized before they become part of the key, so
    /// value-equal but order-different variable objects collide correctly.
    pub fn new(operation: impl Into<String>, variables: Option<&Value>, extra: &[String]) -> Self {
        Self {
            operation: operation.into(),
            variables: variables.map(canonical_variables).unwrap_or_default(),
            extra: extra.to_vec(),
        }
    }

    /// The operation identity this key was built from.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The canonical serialization of the variables this key was built from.
    pub fn variables(&self) -> &str {
        &self.variables
    }

    /// Serialize the key into the string actually used as the map key.
    ///
    /// Total and deterministic: the same logical input always produces an
    /// identical string, independent of object identity.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(
            self.operation.len()
                + self.variables.len()
                + self.extra.iter().map(|p| p.len() + 1).sum::<usize>()
                + 1,
        );
        out.push_str(&self.operation);
        out.push(PART_SEPARATOR);
        out.push_str(&self.variables);
        for part in &self.extra {
            out.push(PART_SEPARATOR);
            out.push_str(part);
        }
        out
    }
}

impl Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheKey")
            .field("operation", &self.operation)
            .field("variables", &self.variables)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Canonicalize a variables value into a deterministic string.
///
/// Object keys are sorted recursively at every level, so the output is
/// identical for value-equal inputs regardless of key insertion order.
/// Non-container values serialize via their default JSON form.
pub fn canonical_variables(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // JSON-escape the key the same way serde_json would.
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
