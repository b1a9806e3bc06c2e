//! Check scope: the site/rack/device constraints that narrow a compliance run.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ScopeError;

/// Well-known scope dimensions, in the order the CLI renders them.
pub const SCOPE_DIMENSIONS: [&str; 3] = ["site", "rack", "device"];

/// A non-empty, insertion-ordered set of `name = value` constraints.
///
/// There is no way to build an empty `Scope`; every constructor rejects it,
/// so a check can never start without something to narrow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scope {
    entries: IndexMap<String, String>,
}

impl Scope {
    /// Build a scope from `(name, value)` pairs, keeping their order.
    ///
    /// A repeated name overwrites the earlier value but keeps the earlier position.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries = IndexMap::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            if key.trim().is_empty() || value.trim().is_empty() {
                return Err(ScopeError::BlankValue { key });
            }
            entries.insert(key, value);
        }

        if entries.is_empty() {
            return Err(ScopeError::Empty);
        }
        Ok(Self { entries })
    }

    /// Build a scope from the three optional CLI filters (site, rack, device).
    pub fn from_filters(
        site: Option<&str>,
        rack: Option<&str>,
        device: Option<&str>,
    ) -> Result<Self, ScopeError> {
        let pairs = SCOPE_DIMENSIONS
            .iter()
            .zip([site, rack, device])
            .filter_map(|(key, value)| value.map(|v| (*key, v)));
        Self::from_pairs(pairs)
    }

    /// Render as `key=value` pairs joined by `", "`, in insertion order.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scope_rejected() {
        let pairs: Vec<(String, String)> = Vec::new();
        assert_eq!(Scope::from_pairs(pairs), Err(ScopeError::Empty));
        assert_eq!(Scope::from_filters(None, None, None), Err(ScopeError::Empty));
    }

    #[test]
    fn test_render_keeps_insertion_order() {
        let scope = Scope::from_pairs([("rack", "R01"), ("site", "DM-Akron"), ("device", "sw01")])
            .unwrap();
        assert_eq!(scope.render(), "rack=R01, site=DM-Akron, device=sw01");
        assert_eq!(scope.len(), 3);
    }

    #[test]
    fn test_single_entry_has_no_separator() {
        let scope = Scope::from_pairs([("site", "DM-Akron")]).unwrap();
        assert_eq!(scope.to_string(), "site=DM-Akron");
    }

    #[test]
    fn test_from_filters_uses_fixed_order() {
        let scope = Scope::from_filters(Some("NYC"), None, Some("core-1")).unwrap();
        assert_eq!(scope.render(), "site=NYC, device=core-1");
        assert_eq!(scope.get("rack"), None);
    }

    #[test]
    fn test_repeated_key_overwrites_in_place() {
        let scope = Scope::from_pairs([("site", "A"), ("rack", "R1"), ("site", "B")]).unwrap();
        assert_eq!(scope.render(), "site=B, rack=R1");
    }

    #[test]
    fn test_blank_value_rejected() {
        let err = Scope::from_pairs([("site", "  ")]).unwrap_err();
        assert_eq!(
            err,
            ScopeError::BlankValue {
                key: "site".to_string()
            }
        );
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let scope = Scope::from_pairs([("site", "NYC"), ("rack", "R2")]).unwrap();
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, r#"{"site":"NYC","rack":"R2"}"#);
    }
}
