//! Flat form input and the key pre-pass for unstructured collections.
use std::collections::HashMap;
use std::str::FromStr;

use indexmap::IndexMap;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::path_de::{self, PathError};

/// A submission: key path → raw tuple of strings.
///
/// Plain entries are `[value, type]`; unstructured-dict entries are
/// `[key, value, type]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatForm {
    entries: IndexMap<String, RawEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEntry(pub Vec<String>);

impl FlatForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, key: impl Into<String>, parts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = RawEntry(parts.into_iter().map(Into::into).collect());
        self.entries.insert(key.into(), entry);
    }

    /// Builder form of [`FlatForm::insert`].
    pub fn with<I, S>(mut self, key: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(key, parts);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for FlatForm {
    type Err = PathError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        path_de::from_str_with_path(src)
    }
}

impl RawEntry {
    fn parts(&self, key: &str, expected: usize) -> Result<&[String], DecodeError> {
        if self.0.len() < expected {
            return Err(DecodeError::MalformedEntry {
                key: key.to_string(),
                expected,
                actual: self.0.len(),
            });
        }
        Ok(&self.0)
    }

    /// `(value, type)` of a plain entry.
    pub fn value_and_type(&self, key: &str) -> Result<(&str, &str), DecodeError> {
        let p = self.parts(key, 2)?;
        Ok((&p[0], &p[1]))
    }

    /// `(literal key, value, type)` of an unstructured-dict entry.
    pub fn keyed(&self, key: &str) -> Result<(&str, &str, &str), DecodeError> {
        let p = self.parts(key, 3)?;
        Ok((&p[0], &p[1], &p[2]))
    }

    /// Submitted type of a plain entry, if it has one.
    pub fn type_name(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// KEY INDEX
// ————————————————————————————————————————————————————————————————————————————

/// One form key found under an unstructured prefix.
#[derive(Debug, Clone, Copy)]
pub struct Member<'f> {
    pub key: &'f str,
    /// Text between the brackets of `prefix[suffix]`.
    pub suffix: &'f str,
    pub entry: &'f RawEntry,
}

impl Member<'_> {
    /// The suffix as a list index, when it is a plain decimal integer.
    /// Digits that do not fit a `usize` are an error, not a non-index.
    pub fn index(&self) -> Result<Option<usize>, DecodeError> {
        if self.suffix.is_empty() || !self.suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        self.suffix
            .parse()
            .map(Some)
            .map_err(|_| DecodeError::IndexOverflow { key: self.key.to_string() })
    }
}

/// Form keys grouped by the unstructured path they belong to, built in a
/// single pass over the form.
#[derive(Debug, Default)]
pub struct KeyIndex<'f> {
    groups: HashMap<String, Vec<Member<'f>>>,
}

impl<'f> KeyIndex<'f> {
    /// A key belongs to prefix `p` when it reads `p[...]`. Overlapping
    /// prefixes resolve to the longest one.
    pub fn build(prefixes: &[String], form: &'f FlatForm) -> Result<Self, DecodeError> {
        let mut prefixes: Vec<&str> = prefixes.iter().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        if prefixes.is_empty() {
            return Ok(Self::default());
        }

        let patterns = prefixes
            .iter()
            .map(|p| format!(r"(?s)^{}\[.*\]$", regex::escape(p)));
        let set = RegexSet::new(patterns)?;

        let mut groups: HashMap<String, Vec<Member<'f>>> = HashMap::new();
        for (key, entry) in form.iter() {
            let Some(prefix) = set
                .matches(key)
                .into_iter()
                .map(|i| prefixes[i])
                .max_by_key(|p| p.len())
            else {
                continue;
            };
            let suffix = &key[prefix.len() + 1..key.len() - 1];
            groups
                .entry(prefix.to_string())
                .or_default()
                .push(Member { key, suffix, entry });
        }
        Ok(Self { groups })
    }

    /// Members of `prefix`, in form order.
    pub fn members(&self, prefix: &str) -> &[Member<'f>] {
        match self.groups.get(prefix) {
            Some(members) => members,
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_json() {
        let form: FlatForm = r#"{"a-x": ["5", "int"], "d[k]": ["k", "1", "int"]}"#.parse().unwrap();
        assert_eq!(form.len(), 2);
        assert_eq!(form.get("a-x").unwrap().value_and_type("a-x").unwrap(), ("5", "int"));
        assert_eq!(form.get("d[k]").unwrap().keyed("d[k]").unwrap(), ("k", "1", "int"));
    }

    #[test]
    fn short_tuples_are_malformed() {
        let form = FlatForm::new().with("a", ["5"]);
        assert!(matches!(
            form.get("a").unwrap().value_and_type("a"),
            Err(DecodeError::MalformedEntry { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn groups_keys_by_longest_declared_prefix() {
        let form = FlatForm::new()
            .with("xs[1]", ["b", "str"])
            .with("xs[0]", ["a", "str"])
            .with("xs-other", ["no", "str"])
            .with("xsy[0]", ["no", "str"])
            .with("t[0][k]", ["k", "v", "str"])
            .with("t[0]", ["no", "str"]);
        let prefixes = vec!["xs".to_string(), "t[0]".to_string(), "t".to_string()];
        let index = KeyIndex::build(&prefixes, &form).unwrap();

        let xs: Vec<_> = index.members("xs").iter().map(|m| m.suffix).collect();
        assert_eq!(xs, ["1", "0"]);
        let nested: Vec<_> = index.members("t[0]").iter().map(|m| m.key).collect();
        assert_eq!(nested, ["t[0][k]"]);
        let outer: Vec<_> = index.members("t").iter().map(|m| m.key).collect();
        assert_eq!(outer, ["t[0]"]);
        assert!(index.members("missing").is_empty());
    }

    #[test]
    fn prefixes_with_regex_metacharacters_are_literal() {
        let form = FlatForm::new().with("a.b[0]", ["1", "int"]).with("aXb[0]", ["2", "int"]);
        let index = KeyIndex::build(&["a.b".to_string()], &form).unwrap();
        assert_eq!(index.members("a.b").len(), 1);
    }

    #[test]
    fn only_decimal_suffixes_are_indices() {
        static EMPTY: RawEntry = RawEntry(Vec::new());
        let m = |suffix: &'static str| Member { key: "xs[..]", suffix, entry: &EMPTY };
        assert_eq!(m("12").index().unwrap(), Some(12));
        assert_eq!(m("007").index().unwrap(), Some(7));
        assert_eq!(m("-1").index().unwrap(), None);
        assert_eq!(m("x").index().unwrap(), None);
        assert_eq!(m("").index().unwrap(), None);
    }

    #[test]
    fn oversized_indices_are_errors() {
        static EMPTY: RawEntry = RawEntry(Vec::new());
        let m = Member { key: "xs[99999999999999999999999]", suffix: "99999999999999999999999", entry: &EMPTY };
        assert!(matches!(
            m.index(),
            Err(DecodeError::IndexOverflow { ref key }) if key == "xs[99999999999999999999999]"
        ));
    }
}
