// Console rendering of supervisor events

use colored::Colorize;
use pipewarden_process::ExitOutcome;

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
        }
    }
}

impl OutputStyle {
    /// Style with colors forced on or off, or detected when `None`
    pub fn with_colors(colors: Option<bool>) -> Self {
        match colors {
            Some(use_colors) => Self { use_colors },
            None => Self::default(),
        }
    }

    /// Format a chunk of the child's stderr
    pub fn stderr_chunk(&self, text: &str) -> String {
        if self.use_colors {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }

    /// Format the completion line
    pub fn outcome(&self, outcome: &ExitOutcome) -> String {
        let line = format!("process {}", outcome);
        match (self.use_colors, outcome.is_success()) {
            (false, true) => format!("✓ {}", line),
            (false, false) => format!("✗ {}", line),
            (true, true) => format!("{} {}", "✓".green().bold(), line),
            (true, false) => format!("{} {}", "✗".red().bold(), line),
        }
    }

    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }
}

/// Decodes a byte stream as UTF-8 across chunk boundaries
///
/// A character split between two reads is held back until its remaining
/// bytes arrive; invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `data` after any bytes held back from the previous chunk
    pub fn push(&mut self, data: &[u8]) -> String {
        self.pending.extend_from_slice(data);

        let keep = match std::str::from_utf8(&self.pending) {
            Ok(_) => 0,
            // Incomplete sequence at the end: wait for the rest of it
            Err(e) if e.error_len().is_none() => self.pending.len() - e.valid_up_to(),
            Err(_) => incomplete_tail(&self.pending),
        };

        let tail = self.pending.split_off(self.pending.len() - keep);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        text
    }

    /// Whatever is still held back, decoded lossily
    pub fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

// Length of a truncated multi-byte sequence at the end of `bytes`, if any
fn incomplete_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let needed = match bytes[i] {
            b if b & 0xE0 == 0xC0 => 2,
            b if b & 0xF0 == 0xE0 => 3,
            b if b & 0xF8 == 0xF0 => 4,
            b if b & 0xC0 == 0x80 => continue,
            _ => return 0,
        };
        let have = bytes.len() - i;
        return if have < needed { have } else { 0 };
    }
    0
}
