//! Bound URL parameters.
//!
//! # Responsibilities
//! - Hold variables bound by pattern matches, in binding order
//! - Distinguish "bound to nothing" (optional variable, absent segment)
//!   from "never bound"
//! - Implement the sticky merge used for the request-wide parameter set
//!
//! # Design Decisions
//! - Insertion order is preserved; `shift_all_params` rotates values by
//!   position, so key order is observable
//! - A value counts as empty when it is `None` or `""`

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered map of variable name to bound value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Option<String>)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound value for `name`. `None` when unset or bound to nothing.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// True if `name` was ever bound, even to nothing.
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Insert or replace, keeping the original position of an existing key.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Sticky merge: a binding replaces an existing one only if it carries a
    /// non-empty value, or the key was not bound before.
    pub fn merge_sticky(&mut self, other: &Params) {
        for (name, value) in other.iter() {
            let non_empty = value.is_some_and(|v| !v.is_empty());
            if non_empty || !self.contains_key(name) {
                self.insert(name, value.map(str::to_string));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite every value positionally, keeping keys. Missing values
    /// become `None`.
    pub(crate) fn set_values(&mut self, values: Vec<Option<String>>) {
        let mut values = values.into_iter();
        for entry in &mut self.entries {
            entry.1 = values.next().flatten();
        }
    }

    pub(crate) fn values(&self) -> Vec<Option<String>> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v.map(Into::into));
        }
        params
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Option<&str>)]) -> Params {
        pairs.iter().map(|(k, v)| (*k, v.map(str::to_string))).collect()
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut p = params(&[("Action", Some("edit")), ("ID", Some("1"))]);
        p.insert("Action", Some("view".into()));
        assert_eq!(p.keys().collect::<Vec<_>>(), vec!["Action", "ID"]);
        assert_eq!(p.get("Action"), Some("view"));
    }

    #[test]
    fn test_bound_to_nothing_is_present() {
        let p = params(&[("OtherID", None)]);
        assert!(p.contains_key("OtherID"));
        assert_eq!(p.get("OtherID"), None);
        assert!(!p.contains_key("ID"));
    }

    #[test]
    fn test_sticky_merge() {
        let mut all = params(&[("ID", Some("42"))]);

        // Empty and null never clobber a value
        all.merge_sticky(&params(&[("ID", None)]));
        assert_eq!(all.get("ID"), Some("42"));
        all.merge_sticky(&params(&[("ID", Some(""))]));
        assert_eq!(all.get("ID"), Some("42"));

        // Non-empty always wins
        all.merge_sticky(&params(&[("ID", Some("7"))]));
        assert_eq!(all.get("ID"), Some("7"));

        // Unset keys are taken even when empty
        all.merge_sticky(&params(&[("OtherID", None)]));
        assert!(all.contains_key("OtherID"));
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let p = params(&[("b", Some("1")), ("a", None)]);
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"b":"1","a":null}"#);
    }
}
