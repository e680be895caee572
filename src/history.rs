// Search history: most-recent-first, one entry per keyword, capped.
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::storage::Storage;

pub const STORAGE_KEY: &str = "search_history";
pub const MAX_HISTORY_ITEMS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub keyword: String,
    /// Unique, monotonically assigned; the deletion key. Keywords come and
    /// go, ids never repeat within a log.
    pub id: u64,
    /// Capture time in Unix milliseconds, display only.
    pub timestamp: u64,
}

/// Recent searches, persisted as one JSON array after every mutation.
///
/// History is a convenience feature: when storage is missing or the blob is
/// unreadable, every operation degrades to a no-op or an empty result and
/// logs a warning instead of surfacing an error.
pub struct HistoryStore {
    storage: Storage,
}

impl HistoryStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn is_storage_available(&self) -> bool {
        self.storage.is_available()
    }

    pub fn add(&self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }
        if !self.storage.is_available() {
            tracing::warn!("storage unavailable, search history not saved");
            return;
        }

        let mut entries = self.get_all();
        entries.retain(|entry| entry.keyword != keyword);

        let timestamp = now_millis();
        let max_id = entries.iter().map(|entry| entry.id).max().unwrap_or(0);
        entries.insert(
            0,
            HistoryEntry {
                keyword: keyword.to_string(),
                id: timestamp.max(max_id + 1),
                timestamp,
            },
        );
        entries.truncate(MAX_HISTORY_ITEMS);

        self.persist(&entries);
    }

    pub fn get_all(&self) -> Vec<HistoryEntry> {
        if !self.storage.is_available() {
            tracing::warn!("storage unavailable, search history not loaded");
            return Vec::new();
        }
        let raw = match self.storage.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!("failed to load search history: {err}");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                // An unreadable blob reads the same as an absent one.
                tracing::warn!("discarding malformed search history: {err}");
                Vec::new()
            }
        }
    }

    /// Deleting an id that is no longer present is a no-op.
    pub fn delete(&self, id: u64) {
        if !self.storage.is_available() {
            tracing::warn!("storage unavailable, search history entry not deleted");
            return;
        }
        let mut entries = self.get_all();
        entries.retain(|entry| entry.id != id);
        self.persist(&entries);
    }

    /// Drops the persisted key entirely rather than writing an empty list.
    pub fn clear(&self) {
        if !self.storage.is_available() {
            tracing::warn!("storage unavailable, search history not cleared");
            return;
        }
        if let Err(err) = self.storage.remove(STORAGE_KEY) {
            tracing::warn!("failed to clear search history: {err}");
        }
    }

    fn persist(&self, entries: &[HistoryEntry]) {
        match serde_json::to_string(entries) {
            Ok(blob) => {
                if let Err(err) = self.storage.set(STORAGE_KEY, &blob) {
                    tracing::warn!("failed to save search history: {err}");
                }
            }
            Err(err) => tracing::warn!("failed to serialize search history: {err}"),
        }
    }

    /// HTML fragment for the history panel. Pure render: whoever injects the
    /// fragment wires its own click handlers.
    pub fn render_html(&self) -> String {
        if !self.storage.is_available() {
            return "<p class=\"no-history\">Local storage is unavailable; search history cannot be shown</p>"
                .to_string();
        }
        let entries = self.get_all();
        if entries.is_empty() {
            return "<p class=\"no-history\">No search history yet</p>".to_string();
        }

        let mut html = String::from("<ul class=\"history-list\">");
        for entry in &entries {
            html.push_str(&format!(
                "<li class=\"history-item\">\
                 <a href=\"result_interface.html?search={href}&redirect=true\" class=\"history-link\">{keyword}</a>\
                 <span class=\"history-time\">{time}</span>\
                 <button class=\"delete-history\" data-id=\"{id}\">×</button>\
                 </li>",
                href = urlencoding::encode(&entry.keyword),
                keyword = html_escape(&entry.keyword),
                time = format_timestamp(entry.timestamp),
                id = entry.id,
            ));
        }
        html.push_str("</ul>");
        html
    }
}

/// Local wall-clock time as `YYYY-MM-DD HH:MM`.
pub fn format_timestamp(millis: u64) -> String {
    Local
        .timestamp_millis_opt(millis as i64)
        .single()
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> HistoryStore {
        HistoryStore::new(Storage::new(dir.path().join("storage")))
    }

    fn broken_store(dir: &TempDir) -> HistoryStore {
        // A plain file where the storage root should be makes every
        // filesystem operation under it fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        HistoryStore::new(Storage::new(blocker))
    }

    #[test]
    fn readding_a_keyword_moves_it_to_the_front() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("phone");
        store.add("laptop");
        store.add("phone");

        let entries = store.get_all();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].keyword, "phone");
        assert_eq!(entries[1].keyword, "laptop");
    }

    #[test]
    fn keywords_stay_unique_and_most_recent_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for keyword in ["a", "b", "c", "b", "a"] {
            store.add(keyword);
        }

        let entries = store.get_all();
        let keywords: Vec<&str> = entries.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(keywords, ["a", "b", "c"]);
    }

    #[test]
    fn cap_evicts_the_oldest_entries() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for i in 0..25 {
            store.add(&format!("kw{i}"));
        }

        let entries = store.get_all();
        assert_eq!(entries.len(), MAX_HISTORY_ITEMS);
        assert_eq!(entries[0].keyword, "kw24");
        assert_eq!(entries.last().unwrap().keyword, "kw5");
    }

    #[test]
    fn ids_are_unique_and_increase_toward_the_front() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for keyword in ["a", "b", "c"] {
            store.add(keyword);
        }

        let entries = store.get_all();
        assert!(entries[0].id > entries[1].id);
        assert!(entries[1].id > entries[2].id);
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("");
        store.add("   ");
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn keywords_are_trimmed_before_matching() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("phone");
        store.add("  phone  ");

        let entries = store.get_all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].keyword, "phone");
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("phone");
        store.add("laptop");

        let id = store.get_all()[0].id;
        store.delete(id);
        store.delete(id);

        let entries = store.get_all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].keyword, "phone");
    }

    #[test]
    fn delete_of_unknown_id_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("phone");
        store.delete(u64::MAX);
        assert_eq!(store.get_all().len(), 1);
    }

    #[test]
    fn entries_survive_a_fresh_store_over_the_same_root() {
        let dir = TempDir::new().unwrap();
        store_in(&dir).add("foo");

        let reopened = store_in(&dir);
        let entries = reopened.get_all();
        assert_eq!(entries[0].keyword, "foo");
    }

    #[test]
    fn clear_removes_the_persisted_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("phone");
        store.clear();

        assert!(store.get_all().is_empty());
        let storage = Storage::new(dir.path().join("storage"));
        assert_eq!(storage.get(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn malformed_blob_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("storage"));
        storage.set(STORAGE_KEY, "definitely { not json").unwrap();

        let store = store_in(&dir);
        assert!(store.get_all().is_empty());

        // The store recovers on the next write.
        store.add("phone");
        assert_eq!(store.get_all().len(), 1);
    }

    #[test]
    fn unavailable_storage_degrades_to_no_ops() {
        let dir = TempDir::new().unwrap();
        let store = broken_store(&dir);

        store.add("phone");
        store.delete(1);
        store.clear();

        assert!(!store.is_storage_available());
        assert!(store.get_all().is_empty());
        assert!(store.render_html().contains("unavailable"));
    }

    #[test]
    fn render_html_reports_empty_history() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.render_html().contains("No search history"));
    }

    #[test]
    fn render_html_lists_entries_with_escaped_keywords() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("tv & \"deals\" <4k>");

        let html = store.render_html();
        assert!(html.contains("<ul class=\"history-list\">"));
        assert!(html.contains("tv &amp; &quot;deals&quot; &lt;4k&gt;"));
        assert!(html.contains("search=tv%20%26%20%22deals%22%20%3C4k%3E"));

        let id = store.get_all()[0].id;
        assert!(html.contains(&format!("data-id=\"{id}\"")));
    }

    #[test]
    fn timestamp_formats_to_minute_precision() {
        let formatted = format_timestamp(1_700_000_000_000);
        assert_eq!(formatted.len(), 16);
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[7..8], "-");
        assert_eq!(&formatted[10..11], " ");
        assert_eq!(&formatted[13..14], ":");
    }
}
