//! Paginated, prefix-filtered key scanning
//!
//! Keys come back from the store in byte-lexicographic order, so every key
//! sharing a prefix sits in one contiguous run starting at the first key
//! `>= prefix`. Both the count and the page fetch seek there and stop at the
//! first key that no longer carries the prefix.

use crate::store::{Flow, ReadView, StoreError};

/// One stored entry as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A row as shown in the key/value table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub value: String,
}

/// Count the keys carrying `prefix`. An empty prefix counts the whole store.
pub fn count_matching(view: &dyn ReadView, prefix: &[u8]) -> Result<usize, StoreError> {
    let mut count = 0;
    view.scan_from(prefix, &mut |key, _| {
        if !key.starts_with(prefix) {
            return Flow::Stop;
        }
        count += 1;
        Flow::Continue
    })?;
    Ok(count)
}

/// Fetch the 1-based page `page_index` of keys carrying `prefix`.
///
/// A page past the end of the matching run is empty rather than an error.
pub fn fetch_page(
    view: &dyn ReadView,
    prefix: &[u8],
    page_index: usize,
    page_size: usize,
) -> Result<Vec<Entry>, StoreError> {
    if page_size == 0 {
        return Ok(Vec::new());
    }

    let skip = page_index.saturating_sub(1).saturating_mul(page_size);
    let mut skipped = 0;
    let mut entries = Vec::with_capacity(page_size);

    view.scan_from(prefix, &mut |key, value| {
        if !key.starts_with(prefix) {
            return Flow::Stop;
        }
        if skipped < skip {
            skipped += 1;
            return Flow::Continue;
        }
        entries.push(Entry {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        if entries.len() == page_size {
            Flow::Stop
        } else {
            Flow::Continue
        }
    })?;

    Ok(entries)
}

/// Number of pages needed for `total_records`, never less than one.
pub fn total_pages(total_records: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total_records.div_ceil(page_size).max(1)
}

/// Key as displayed, with `prefix` removed when `hide_prefix` is set.
///
/// Bytes that are not UTF-8 are shown lossily, so the display text cannot be
/// mapped back to the stored key. Keep the fetched [`Entry`] key for that.
pub fn display_key(stored: &[u8], prefix: &str, hide_prefix: bool) -> String {
    let shown = if hide_prefix {
        stored.strip_prefix(prefix.as_bytes()).unwrap_or(stored)
    } else {
        stored
    };
    String::from_utf8_lossy(shown).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore};

    fn keys(entries: &[Entry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| String::from_utf8_lossy(&e.key).into_owned())
            .collect()
    }

    fn count(store: &MemoryStore, prefix: &str) -> usize {
        let mut n = 0;
        store
            .read(&mut |view| {
                n = count_matching(view, prefix.as_bytes())?;
                Ok(())
            })
            .unwrap();
        n
    }

    fn page(store: &MemoryStore, prefix: &str, index: usize, size: usize) -> Vec<Entry> {
        let mut out = Vec::new();
        store
            .read(&mut |view| {
                out = fetch_page(view, prefix.as_bytes(), index, size)?;
                Ok(())
            })
            .unwrap();
        out
    }

    fn numbered_store(n: usize) -> MemoryStore {
        MemoryStore::from_entries((0..n).map(|i| (format!("key:{:03}", i), format!("v{}", i))))
    }

    #[test]
    fn test_prefix_pages_one_at_a_time() {
        let store = MemoryStore::from_entries([("a:1", "x"), ("a:2", "y"), ("b:1", "z")]);

        assert_eq!(count(&store, "a:"), 2);
        assert_eq!(keys(&page(&store, "a:", 1, 1)), vec!["a:1"]);
        assert_eq!(keys(&page(&store, "a:", 2, 1)), vec!["a:2"]);
        assert!(page(&store, "a:", 3, 1).is_empty());
    }

    #[test]
    fn test_empty_prefix_covers_whole_store() {
        let store = numbered_store(25);

        assert_eq!(count(&store, ""), 25);
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(page(&store, "", 1, 10).len(), 10);
        assert_eq!(page(&store, "", 3, 10).len(), 5);
        assert!(page(&store, "", 4, 10).is_empty());
    }

    #[test]
    fn test_pages_partition_matching_keys() {
        let mut entries: Vec<(String, String)> = Vec::new();
        for group in ["alpha", "beta", "beta2", "gamma"] {
            for i in 0..17 {
                entries.push((format!("{}/{:02}", group, i), String::new()));
            }
        }
        let store = MemoryStore::from_entries(entries);

        for prefix in ["", "beta", "beta/", "gamma/1", "zzz"] {
            for size in [1, 3, 7, 10, 100] {
                let total = count(&store, prefix);
                let pages = total_pages(total, size);
                let mut seen = Vec::new();
                for index in 1..=pages {
                    let rows = page(&store, prefix, index, size);
                    assert!(rows.len() <= size);
                    seen.extend(keys(&rows));
                }
                assert_eq!(seen.len(), total, "prefix {:?} size {}", prefix, size);

                let mut deduped = seen.clone();
                deduped.dedup();
                assert_eq!(deduped, seen, "no duplicates across pages");
                assert!(seen.iter().all(|k| k.starts_with(prefix)));
            }
        }
    }

    #[test]
    fn test_scan_stops_at_end_of_prefix_run() {
        let store = MemoryStore::from_entries([("a", ""), ("ab", ""), ("abc", ""), ("b", "")]);

        assert_eq!(count(&store, "ab"), 2);
        assert_eq!(keys(&page(&store, "ab", 1, 10)), vec!["ab", "abc"]);
    }

    #[test]
    fn test_prefix_with_no_matches() {
        let store = MemoryStore::from_entries([("a", ""), ("c", "")]);

        assert_eq!(count(&store, "b"), 0);
        assert!(page(&store, "b", 1, 10).is_empty());
        assert_eq!(total_pages(0, 10), 1);
    }

    #[test]
    fn test_zero_page_size_returns_nothing() {
        let store = numbered_store(3);
        assert!(page(&store, "", 1, 0).is_empty());
        assert_eq!(total_pages(3, 0), 1);
    }

    #[test]
    fn test_page_carries_values() {
        let store = numbered_store(5);
        let rows = page(&store, "key:00", 2, 2);
        assert_eq!(keys(&rows), vec!["key:002", "key:003"]);
        assert_eq!(rows[0].value, b"v2".to_vec());
    }

    #[test]
    fn test_display_key_hides_prefix() {
        let prefix = "users:";
        let stored = b"users:42";

        assert_eq!(display_key(stored, prefix, true), "42");
        assert_eq!(display_key(stored, prefix, false), "users:42");
        assert_eq!(display_key(b"other:1", prefix, true), "other:1");
    }

    #[test]
    fn test_display_key_with_empty_prefix() {
        assert_eq!(display_key(b"plain", "", true), "plain");
    }

    #[test]
    fn test_binary_keys_page_with_raw_bytes() {
        let store = MemoryStore::new();
        store.put(b"bin:\xff\x01", b"raw").unwrap();
        store.put(b"bin:ok", b"text").unwrap();

        let rows = page(&store, "bin:", 1, 10);
        assert_eq!(rows[0].key, b"bin:ok".to_vec());
        assert_eq!(rows[1].key, b"bin:\xff\x01".to_vec());
        assert_eq!(display_key(&rows[1].key, "bin:", true), "\u{fffd}\u{1}");
    }
}
