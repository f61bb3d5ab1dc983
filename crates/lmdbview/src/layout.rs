//! Column width allocation and value truncation for the key/value table

use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::scanner::{display_key, Entry, Row};

/// Longest value preview kept before any width computation.
pub const PREVIEW_MAX_CHARS: usize = 195;
/// The value column never gets narrower than this many characters.
pub const MIN_VALUE_CHARS: f32 = 30.0;
/// Truncation never cuts a value shorter than this many characters.
pub const MIN_CUT_CHARS: usize = 20;
/// Upper bound on truncation workers.
pub const MAX_WIDTH_WORKERS: usize = 4;

/// Text measurements in units of one narrow terminal cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Width of one narrow cell. Wide characters take two.
    pub char_width: f32,
    /// Narrowest key column.
    pub key_floor: f32,
    /// Extra room added to the widest key.
    pub key_padding: f32,
}

impl Metrics {
    /// One unit per terminal cell.
    pub const TERMINAL: Metrics = Metrics {
        char_width: 1.0,
        key_floor: 20.0,
        key_padding: 2.0,
    };

    pub fn text_width(&self, text: &str) -> f32 {
        text.width() as f32 * self.char_width
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnWidths {
    pub key: f32,
    pub value: f32,
}

/// Single-line preview of a stored value.
pub fn preview(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .chars()
        .take(PREVIEW_MAX_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Turn fetched entries into display rows.
pub fn prepare_rows(
    entries: &[Entry],
    prefix: &str,
    hide_key_prefix: bool,
    hide_values: bool,
) -> Vec<Row> {
    entries
        .iter()
        .map(|entry| Row {
            key: display_key(&entry.key, prefix, hide_key_prefix),
            value: if hide_values {
                String::new()
            } else {
                preview(&entry.value)
            },
        })
        .collect()
}

/// Longest prefix of `value` whose width plus one space fits in `budget`.
///
/// Width grows monotonically with length, so the cut is found by binary
/// search over character counts. Values that already fit are returned whole.
pub fn truncate_to_fit<'a>(value: &'a str, budget: f32, metrics: &Metrics) -> &'a str {
    if metrics.text_width(value) <= budget {
        return value;
    }

    // Byte end and cell width of every prefix, one entry per character.
    let mut cells = 0;
    let prefixes: Vec<(usize, usize)> = value
        .char_indices()
        .map(|(i, c)| {
            cells += c.width().unwrap_or(0);
            (i + c.len_utf8(), cells)
        })
        .collect();
    let width_of = |chars: usize| match chars {
        0 => 0.0,
        n => prefixes[n - 1].1 as f32 * metrics.char_width,
    };

    let space = metrics.char_width;
    let mut low = MIN_CUT_CHARS.min(prefixes.len());
    let mut high = prefixes.len();
    while low < high {
        let mid = (low + high).div_ceil(2);
        if width_of(mid) + space > budget {
            high = mid - 1;
        } else {
            low = mid;
        }
    }

    match low {
        0 => "",
        n => &value[..prefixes[n - 1].0],
    }
}

/// Fits page rows into the table width on a bounded worker pool.
pub struct RowFormatter {
    pool: ThreadPool,
    metrics: Metrics,
}

impl RowFormatter {
    pub fn new(metrics: Metrics) -> Result<Self> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_WIDTH_WORKERS);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("lmdbview-width-{}", i))
            .build()
            .context("Failed to start width workers")?;
        Ok(Self { pool, metrics })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Allocate column widths for `rows` within `width` and cut values to fit.
    ///
    /// Returns once every row has been processed.
    pub fn fit(&self, rows: &mut [Row], width: f32, hide_values: bool) -> ColumnWidths {
        let metrics = self.metrics;

        if hide_values {
            for row in rows.iter_mut() {
                row.value.clear();
            }
            return ColumnWidths {
                key: width,
                value: 0.0,
            };
        }

        let widest = rows
            .iter()
            .map(|row| metrics.text_width(&row.key))
            .fold(metrics.key_floor, f32::max);
        let key = widest + metrics.key_padding;
        let value = (width - key).max(MIN_VALUE_CHARS * metrics.char_width);

        self.pool.install(|| {
            rows.par_iter_mut().for_each(|row| {
                let end = truncate_to_fit(&row.value, value, &metrics).len();
                row.value.truncate(end);
            });
        });

        ColumnWidths { key, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: &str) -> Row {
        Row {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_short_value_untouched() {
        let metrics = Metrics::TERMINAL;
        assert_eq!(truncate_to_fit("hello", 40.0, &metrics), "hello");
        assert_eq!(truncate_to_fit("", 40.0, &metrics), "");
    }

    #[test]
    fn test_long_value_cut_leaves_room_for_space() {
        let metrics = Metrics::TERMINAL;
        let value = "x".repeat(100);

        let cut = truncate_to_fit(&value, 40.0, &metrics);
        assert_eq!(cut.len(), 39);
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let metrics = Metrics {
            char_width: 7.5,
            key_floor: 300.0,
            key_padding: 10.0,
        };
        let value = "the quick brown fox jumps over the lazy dog ".repeat(8);

        for budget in [160.0, 225.0, 400.0, 1000.0, 5000.0] {
            let once = truncate_to_fit(&value, budget, &metrics);
            let twice = truncate_to_fit(once, budget, &metrics);
            assert_eq!(once, twice, "budget {}", budget);
        }
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let metrics = Metrics::TERMINAL;
        let value = "é".repeat(60);

        let cut = truncate_to_fit(&value, 30.0, &metrics);
        assert_eq!(cut.chars().count(), 29);
        assert!(value.starts_with(cut));
    }

    #[test]
    fn test_wide_characters_take_two_cells() {
        let metrics = Metrics::TERMINAL;
        assert_eq!(metrics.text_width("漢字"), 4.0);
        assert_eq!(metrics.text_width("ab漢"), 4.0);

        let value = "漢".repeat(60);
        let cut = truncate_to_fit(&value, 60.0, &metrics);
        assert_eq!(cut.chars().count(), 29);
        assert_eq!(metrics.text_width(cut), 58.0);
        assert!(value.starts_with(cut));
    }

    #[test]
    fn test_truncation_keeps_minimum_cut() {
        let metrics = Metrics::TERMINAL;
        let value = "y".repeat(50);

        let cut = truncate_to_fit(&value, 5.0, &metrics);
        assert_eq!(cut.len(), MIN_CUT_CHARS);
    }

    #[test]
    fn test_preview_flattens_and_caps() {
        assert_eq!(preview(b"line one\nline two\r\n"), "line one line two  ");

        let long = "z".repeat(500);
        assert_eq!(preview(long.as_bytes()).len(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn test_prepare_rows_hides_prefix_and_values() {
        let entries = vec![Entry {
            key: b"cfg:timeout".to_vec(),
            value: b"30".to_vec(),
        }];

        let rows = prepare_rows(&entries, "cfg:", true, false);
        assert_eq!(rows, vec![row("timeout", "30")]);

        let rows = prepare_rows(&entries, "cfg:", false, true);
        assert_eq!(rows, vec![row("cfg:timeout", "")]);
    }

    #[test]
    fn test_fit_allocates_key_then_value() {
        let formatter = RowFormatter::new(Metrics::TERMINAL).unwrap();
        let long_key = "k".repeat(30);
        let mut rows = vec![row(&long_key, &"v".repeat(150)), row("short", "tiny")];

        let widths = formatter.fit(&mut rows, 100.0, false);

        assert_eq!(widths.key, 32.0);
        assert_eq!(widths.value, 68.0);
        assert_eq!(rows[0].value.len(), 67);
        assert_eq!(rows[1].value, "tiny");
    }

    #[test]
    fn test_fit_uses_key_floor_and_value_floor() {
        let formatter = RowFormatter::new(Metrics::TERMINAL).unwrap();
        let mut rows = vec![row("a", &"v".repeat(80))];

        let widths = formatter.fit(&mut rows, 40.0, false);

        assert_eq!(widths.key, 22.0);
        assert_eq!(widths.value, MIN_VALUE_CHARS);
        assert_eq!(rows[0].value.len(), 29);
    }

    #[test]
    fn test_fit_with_hidden_values_gives_keys_full_width() {
        let formatter = RowFormatter::new(Metrics::TERMINAL).unwrap();
        let mut rows = vec![row("a", "value"), row("b", "other")];

        let widths = formatter.fit(&mut rows, 80.0, true);

        assert_eq!(widths, ColumnWidths { key: 80.0, value: 0.0 });
        assert!(rows.iter().all(|r| r.value.is_empty()));
    }

    #[test]
    fn test_fit_processes_every_row() {
        let formatter = RowFormatter::new(Metrics::TERMINAL).unwrap();
        let mut rows: Vec<Row> = (0..500)
            .map(|i| row(&format!("k{}", i), &"w".repeat(100 + i % 50)))
            .collect();

        let widths = formatter.fit(&mut rows, 60.0, false);

        let limit = widths.value as usize;
        assert!(rows.iter().all(|r| r.value.len() < limit));
    }
}
