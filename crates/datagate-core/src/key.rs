//! Canonical, hashable keys derived from rows and parameter vectors.
//!
//! `Value` holds floats and so cannot be `Eq + Hash` itself. These keys map
//! each value to a canonical form so identity lookups and query memoization
//! can use plain hash maps.

use crate::Result;
use crate::row::Row;
use crate::value::Value;
use std::fmt;

/// Hashable canonical form of a single [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Bit pattern, with `-0.0` folded into `0.0` and every NaN into one
    Float(u64),
    Text(String),
}

impl From<&Value> for KeyValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyValue::Null,
            Value::Bool(b) => KeyValue::Bool(*b),
            Value::Int(i) => KeyValue::Int(*i),
            Value::Float(f) => {
                let f = if *f == 0.0 {
                    0.0
                } else if f.is_nan() {
                    f64::NAN
                } else {
                    *f
                };
                KeyValue::Float(f.to_bits())
            }
            Value::Text(s) => KeyValue::Text(s.clone()),
        }
    }
}

/// A row restricted to its type's key fields, in canonical order.
///
/// Fields are sorted by name, so two key-subsets that are equal as sets of
/// `(field, value)` pairs produce equal keys whatever order the fields came
/// in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(Vec<(String, KeyValue)>);

impl IdentityKey {
    /// Build the identity key of `row` for the given key fields.
    ///
    /// Every key field must be present in the row.
    #[allow(clippy::result_large_err)]
    pub fn from_row<S: AsRef<str>>(row: &Row, key_fields: &[S]) -> Result<Self> {
        let subset = row.subset(key_fields)?;
        let mut parts: Vec<(String, KeyValue)> = subset
            .iter()
            .map(|(k, v)| (k.to_string(), KeyValue::from(v)))
            .collect();
        parts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self(parts))
    }

    /// Key field names, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Canonical form of an ordered parameter vector.
///
/// Unlike [`IdentityKey`], order matters: `(1, 2)` and `(2, 1)` are
/// different bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey(Vec<KeyValue>);

impl ParamKey {
    pub fn new(params: &[Value]) -> Self {
        Self(params.iter().map(KeyValue::from).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_ignores_field_order() {
        let a = Row::from_pairs([
            ("id", Value::Int(1)),
            ("tenant", Value::from("x")),
            ("name", Value::from("a")),
        ]);
        let b = Row::from_pairs([
            ("name", Value::from("other")),
            ("tenant", Value::from("x")),
            ("id", Value::Int(1)),
        ]);

        let ka = IdentityKey::from_row(&a, &["id", "tenant"]).unwrap();
        let kb = IdentityKey::from_row(&b, &["tenant", "id"]).unwrap();
        assert_eq!(ka, kb);
        assert_eq!(ka.fields().collect::<Vec<_>>(), vec!["id", "tenant"]);
    }

    #[test]
    fn identity_key_distinguishes_values_and_types() {
        let one = Row::from_pairs([("id", Value::Int(1))]);
        let two = Row::from_pairs([("id", Value::Int(2))]);
        let text = Row::from_pairs([("id", Value::from("1"))]);

        let k1 = IdentityKey::from_row(&one, &["id"]).unwrap();
        assert_ne!(k1, IdentityKey::from_row(&two, &["id"]).unwrap());
        assert_ne!(k1, IdentityKey::from_row(&text, &["id"]).unwrap());
    }

    #[test]
    fn identity_key_requires_key_fields() {
        let row = Row::from_pairs([("name", Value::from("a"))]);
        assert!(IdentityKey::from_row(&row, &["id"]).is_err());
    }

    #[test]
    fn param_key_is_ordered() {
        let a = ParamKey::new(&[Value::Int(1), Value::Int(2)]);
        let b = ParamKey::new(&[Value::Int(2), Value::Int(1)]);
        assert_ne!(a, b);
        assert_eq!(a, ParamKey::new(&[Value::Int(1), Value::Int(2)]));
        assert!(ParamKey::new(&[]).is_empty());
    }

    #[test]
    fn float_zero_and_nan_are_canonical() {
        assert_eq!(
            KeyValue::from(&Value::Float(0.0)),
            KeyValue::from(&Value::Float(-0.0))
        );
        assert_eq!(
            KeyValue::from(&Value::Float(f64::NAN)),
            KeyValue::from(&Value::Float(-f64::NAN))
        );
    }
}
