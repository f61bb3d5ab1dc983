//! Formatting of stored values for the editor

/// Text shown when a value is opened for editing.
///
/// JSON objects are pretty-printed with two-space indentation; anything else
/// is shown as-is.
pub fn format_for_editing(raw: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(raw) {
        Ok(value @ serde_json::Value::Object(_)) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned()),
        _ => String::from_utf8_lossy(raw).into_owned(),
    }
}
