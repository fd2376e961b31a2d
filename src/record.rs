//! Items, their persisted records and the differences between two records.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved attribute key holding the HTML fragment of an item's description.
pub const DESCRIPTION: &str = "description";

/// Keys owned by [`Record`] itself, never stored as scraped attributes.
pub const STRUCTURAL_KEYS: [&str; 2] = ["id", "db_url"];

/// An entry of the directory as listed on the selection form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: String,
    db_url: String,
}

impl Item {
    pub fn new(id: impl Into<String>, db_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            db_url: db_url.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn db_url(&self) -> &str {
        &self.db_url
    }

    /// Builds the record of a successfully parsed detail page.
    pub fn to_record(&self, attributes: Attributes) -> Record {
        Record::with_attributes(&self.id, &self.db_url, attributes)
    }
}

/// Scraped column label to value mapping.
///
/// Keys are the labels of the detail page table (`Author`, `Price`, ...)
/// plus [`DESCRIPTION`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn description(&self) -> Option<&str> {
        self.get(DESCRIPTION)
    }

    pub fn set_description(&mut self, html: impl Into<String>) {
        self.insert(DESCRIPTION, html);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Attributes {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Persisted form of an item: `id` and `db_url` with the attributes
/// flattened alongside them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    db_url: String,
    #[serde(flatten)]
    attributes: Attributes,
}

impl Record {
    pub fn new(id: impl Into<String>, db_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            db_url: db_url.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(
        id: impl Into<String>,
        db_url: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        let mut record = Self::new(id, db_url);
        for (key, value) in attributes {
            if STRUCTURAL_KEYS.contains(&key.as_str()) {
                log::debug!("Ignoring scraped attribute {key:?} of {}", record.id);
                continue;
            }
            record.attributes.insert(key, value);
        }
        record
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn db_url(&self) -> &str {
        &self.db_url
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Looks up a structural field or an attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "id" => Some(&self.id),
            "db_url" => Some(&self.db_url),
            _ => self.attributes.get(key),
        }
    }

    /// Overwrites a structural field or an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        match key.as_str() {
            "id" => self.id = value,
            "db_url" => self.db_url = value,
            _ => {
                self.attributes.insert(key, value);
            }
        }
    }

    /// Every key of the flat persisted form, structural fields first.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        [("id", self.id.as_str()), ("db_url", self.db_url.as_str())]
            .into_iter()
            .chain(self.attributes.iter())
    }

    /// Keys of `self` that are missing from `stored` or hold another value.
    ///
    /// Keys only present in `stored` are left out: they are never deleted.
    pub fn diff(&self, stored: Option<&Record>) -> Diff {
        match stored {
            Some(stored) => Diff::Changed(self.changes(stored)),
            None => Diff::New(self.clone()),
        }
    }

    /// Changes turning `stored` into a superset of `self`.
    pub fn changes(&self, stored: &Record) -> Changes {
        let fields = self
            .fields()
            .filter(|(key, value)| stored.get(key) != Some(*value))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Changes {
            id: stored.id.clone(),
            fields,
            fresh: self.clone(),
        }
    }

    /// Union merge: colliding keys are overwritten, nothing is removed.
    pub fn merge(&mut self, changes: Changes) {
        for (key, value) in changes.fields {
            self.set(key, value);
        }
    }
}

/// Changed or added keys of an already stored record.
///
/// The fresh record they were computed from travels along, so the changes
/// can still be inserted whole in a collection lacking the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changes {
    id: String,
    fields: BTreeMap<String, String>,
    fresh: Record,
}

impl Changes {
    /// Identifier of the stored record the changes apply to.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The fresh record the changes were computed from.
    pub(crate) fn into_record(self) -> Record {
        self.fresh
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff {
    /// Nothing stored yet, the whole fresh record.
    New(Record),
    /// Empty when the stored record is up to date.
    Changed(Changes),
}

impl Diff {
    pub fn id(&self) -> &str {
        match self {
            Self::New(record) => record.id(),
            Self::Changed(changes) => changes.id(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Changed(changes) if changes.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        Record::with_attributes("game", "https://db/?id=game", pairs.iter().copied().collect())
    }

    #[test]
    fn diff_against_nothing_is_new() {
        let fresh = record(&[("a", "1")]);
        assert_eq!(fresh.diff(None), Diff::New(fresh.clone()));
        assert!(!fresh.diff(None).is_empty());
    }

    #[test]
    fn diff_of_identical_records_is_empty() {
        let fresh = record(&[("a", "1"), (DESCRIPTION, "<p>x</p>")]);
        let stored = fresh.clone();
        assert!(fresh.diff(Some(&stored)).is_empty());
    }

    #[test]
    fn diff_keeps_changed_and_added_keys_only() {
        let stored = record(&[("a", "1"), ("b", "2")]);
        let fresh = record(&[("a", "1"), ("b", "3"), ("c", "4")]);

        let Diff::Changed(changes) = fresh.diff(Some(&stored)) else {
            panic!("expected changes");
        };
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(changes.get("b"), Some("3"));
        assert_eq!(changes.get("c"), Some("4"));

        let mut merged = stored;
        merged.merge(changes);
        assert_eq!(merged, record(&[("a", "1"), ("b", "3"), ("c", "4")]));
    }

    #[test]
    fn whitespace_counts_as_change() {
        let stored = record(&[("a", "1")]);
        let fresh = record(&[("a", "1 ")]);
        assert!(!fresh.diff(Some(&stored)).is_empty());
    }

    #[test]
    fn removed_keys_are_retained() {
        let stored = record(&[("a", "1"), ("gone", "x")]);
        let fresh = record(&[("a", "1")]);
        let diff = fresh.diff(Some(&stored));
        assert!(diff.is_empty());
    }

    #[test]
    fn moved_url_is_a_change() {
        let stored = record(&[]);
        let fresh = Record::new("game", "https://elsewhere/?id=game");
        let Diff::Changed(changes) = fresh.diff(Some(&stored)) else {
            panic!("expected changes");
        };
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["db_url"]);
        let mut merged = stored;
        merged.merge(changes);
        assert_eq!(merged.db_url(), "https://elsewhere/?id=game");
    }

    #[test]
    fn structural_attributes_are_ignored() {
        let record = Item::new("game", "u").to_record(
            [("id", "other"), ("db_url", "v"), ("Author", "me")]
                .into_iter()
                .collect(),
        );
        assert_eq!(record.id(), "game");
        assert_eq!(record.db_url(), "u");
        assert_eq!(record.attributes().len(), 1);
    }

    #[test]
    fn flat_json() {
        let record = record(&[("Author", "me"), (DESCRIPTION, "<p>x</p>")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "game",
                "db_url": "https://db/?id=game",
                "Author": "me",
                "description": "<p>x</p>",
            })
        );
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn json_requires_id_and_strings() {
        assert!(serde_json::from_str::<Record>(r#"{"db_url": "u"}"#).is_err());
        assert!(serde_json::from_str::<Record>(r#"{"id": "a", "db_url": "u", "n": 1}"#).is_err());
    }
}
