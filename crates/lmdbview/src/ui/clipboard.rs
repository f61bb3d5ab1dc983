//! System clipboard through the terminal's OSC 52 escape sequence

use anyhow::{Context, Result};
use base64::Engine;
use crossterm::{execute, style::Print};
use std::io;

/// Escape sequence asking the terminal to put `data` on the clipboard.
pub fn osc52(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    format!("\x1b]52;c;{}\x07", encoded)
}

pub fn copy(data: &[u8]) -> Result<()> {
    execute!(io::stdout(), Print(osc52(data))).context("Failed to write to the terminal clipboard")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osc52_encodes_key() {
        assert_eq!(osc52(b"users:1"), "\x1b]52;c;dXNlcnM6MQ==\x07");
    }

    #[test]
    fn test_osc52_keeps_raw_bytes() {
        assert_eq!(osc52(b"\xff\x00"), "\x1b]52;c;/wA=\x07");
        assert_eq!(osc52(b""), "\x1b]52;c;\x07");
    }
}
