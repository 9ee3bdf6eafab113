//! Multi-valued launch parameters.

use std::collections::BTreeMap;

/// Request parameters of a launch, keyed case-sensitively.
///
/// A name may carry several values (repeated form fields). A name with no
/// values, or whose only values are empty strings, reads as absent through
/// [`get`](Self::get) but still takes part in signature normalization via
/// [`pairs`](Self::pairs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParameters {
    values: BTreeMap<String, Vec<String>>,
}

impl LaunchParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// First non-empty value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)?
            .iter()
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }

    /// Every value for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Flattened `(name, value)` pairs, one per value.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Parameters whose name starts with `prefix`, with the prefix stripped
    /// once. Only the first value of each name is returned.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.values.iter().filter_map(move |(k, vs)| {
            let stripped = k.strip_prefix(prefix)?;
            let value = vs.first()?;
            (!stripped.is_empty()).then_some((stripped, value.as_str()))
        })
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LaunchParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for LaunchParameters {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}
