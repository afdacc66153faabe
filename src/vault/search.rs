//! Snapshot-backed entry search.
//!
//! A search captures the entry list as it was when the search started.
//! Mutations made afterwards replace the store's list instead of editing
//! it in place, so a `SearchResults` keeps seeing its original snapshot and
//! can be iterated any number of times.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::entry::{normalize_group, Entry};

/// Lazily filtered view over an immutable snapshot of entries.
pub struct SearchResults<P> {
    snapshot: Arc<Vec<Entry>>,
    predicate: P,
}

impl<P> SearchResults<P>
where
    P: Fn(&Entry) -> bool,
{
    pub(crate) fn new(snapshot: Arc<Vec<Entry>>, predicate: P) -> Self {
        Self {
            snapshot,
            predicate,
        }
    }

    /// Iterate matching entries in insertion order.  Restartable: each call
    /// starts again from the beginning of the same snapshot.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.snapshot.iter().filter(move |e| (self.predicate)(*e))
    }

    /// Number of matching entries.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Clone the matching entries out of the snapshot.
    pub fn collect_entries(&self) -> Vec<Entry> {
        self.iter().cloned().collect()
    }
}

impl<'a, P> IntoIterator for &'a SearchResults<P>
where
    P: Fn(&Entry) -> bool,
{
    type Item = &'a Entry;
    type IntoIter = Box<dyn Iterator<Item = &'a Entry> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Common search criteria, usable as a predicate via [`Query::matches`].
///
/// Text matching is case-insensitive over title, username, URL, notes,
/// group and custom field names.  The secret and field values are never
/// searched.
#[derive(Debug, Clone, Default)]
pub struct Query {
    text: Option<String>,
    tags: Vec<String>,
    group: Option<String>,
    expired_at: Option<DateTime<Utc>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `text` to appear in one of the searchable fields.
    pub fn text(mut self, text: &str) -> Self {
        let text = text.trim().to_lowercase();
        self.text = if text.is_empty() { None } else { Some(text) };
        self
    }

    /// Require the entry to carry `tag`.  Repeated calls require all tags.
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.trim().to_string());
        self
    }

    /// Require the entry to sit in `group` or below it.
    pub fn group(mut self, group: &str) -> Self {
        let group = normalize_group(group);
        self.group = if group.is_empty() { None } else { Some(group) };
        self
    }

    /// Require the entry to have expired by `now`.
    pub fn expired(mut self, now: DateTime<Utc>) -> Self {
        self.expired_at = Some(now);
        self
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.tags.iter().all(|t| entry.has_tag(t)) {
            return false;
        }
        if self.group.as_deref().is_some_and(|g| !entry.in_group(g)) {
            return false;
        }
        if self.expired_at.is_some_and(|now| !entry.is_expired(now)) {
            return false;
        }
        match &self.text {
            None => true,
            Some(needle) => {
                let hit = |field: &str| field.to_lowercase().contains(needle.as_str());
                [&entry.title, &entry.username, &entry.url, &entry.notes, &entry.group]
                    .iter()
                    .any(|field| hit(field))
                    || entry.custom_fields.iter().any(|f| hit(&f.name))
            }
        }
    }

    /// Turn the query into an owned predicate closure.
    pub fn into_predicate(self) -> impl Fn(&Entry) -> bool {
        move |entry| self.matches(entry)
    }
}
