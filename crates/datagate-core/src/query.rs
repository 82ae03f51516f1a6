//! Query keys: which provider template a fetch uses.

use std::fmt;

use crate::Result;
use crate::error::{Error, LookupError, LookupErrorKind};

/// Selects a template from a type's query map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    /// The `single` template
    Single,
    /// The `all` template
    All,
    /// Any other named template, e.g. `byEmail`
    ByName(String),
}

impl QueryKey {
    /// Key for a template name as it appears in a provider's map.
    pub fn from_name(name: &str) -> Self {
        match name {
            "single" => QueryKey::Single,
            "all" => QueryKey::All,
            other => QueryKey::ByName(other.to_string()),
        }
    }

    /// Shorthand for a named key.
    pub fn by(name: impl AsRef<str>) -> Self {
        Self::from_name(name.as_ref())
    }

    /// Resolve an operation name of the `fetch` family.
    ///
    /// `fetch` selects `single`, `fetchAll` selects `all`, and
    /// `fetchBy<Name>` selects `<Name>` with its first letter lowered.
    #[allow(clippy::result_large_err)]
    pub fn from_operation(operation: &str) -> Result<Self> {
        match operation {
            "fetch" => Ok(QueryKey::Single),
            "fetchAll" => Ok(QueryKey::All),
            _ => match operation.strip_prefix("fetchBy") {
                Some(rest) if !rest.is_empty() => Ok(Self::from_name(&lower_first(rest))),
                _ => Err(Error::Lookup(LookupError {
                    kind: LookupErrorKind::UnknownOperation,
                    type_name: None,
                    name: operation.to_string(),
                    message: "not a fetch, fetchAll or fetchBy<Name> operation".to_string(),
                })),
            },
        }
    }

    /// The template name this key looks up.
    pub fn as_str(&self) -> &str {
        match self {
            QueryKey::Single => "single",
            QueryKey::All => "all",
            QueryKey::ByName(name) => name,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
