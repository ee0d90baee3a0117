//! Turns raw makefile bytes into logical lines, joining backslash-continuations.
//!
//! A physical line ending in an (unescaped) `\` is joined with the line that follows it, the
//! continuation becoming a single space, matching the BSD/GNU convention. Any other `\c` sequence
//! is left untouched here — recipe lines interpret their own escapes, and the shell interprets
//! anything else. Each logical line remembers the 1-indexed physical line number of its first
//! constituent physical line, so diagnostics can point at a sensible location even when several
//! physical lines were joined.

use std::io::{self, BufRead};
use std::path::PathBuf;

/// One logical line of a makefile: zero or more physical lines joined by trailing backslashes.
#[derive(Clone, Debug)]
pub struct LogicalLine {
    pub content: String,
    pub line_number: usize,
    /// Set by the include processor when this line was spliced in from another file; `None`
    /// means "the file currently being parsed".
    pub source: Option<PathBuf>,
}

/// Reads logical lines out of any `BufRead`, eagerly, preserving tab indentation verbatim.
pub struct LineReader;

impl LineReader {
    /// Read every logical line out of `stream`.
    pub fn read<R: BufRead>(stream: R) -> io::Result<Vec<LogicalLine>> {
        let mut result = Vec::new();
        let mut buf = String::new();
        let mut start_line = 1usize;
        let mut physical_line = 0usize;
        let mut pending = false;

        for raw in stream.lines() {
            physical_line += 1;
            let raw = raw?;

            if !pending {
                start_line = physical_line;
            }

            // An odd number of trailing backslashes means the final one escapes the newline.
            let trailing_backslashes = raw.chars().rev().take_while(|&c| c == '\\').count();
            if trailing_backslashes % 2 == 1 {
                buf.push_str(&raw[..raw.len() - 1]);
                buf.push(' ');
                pending = true;
                continue;
            }

            buf.push_str(&raw);
            result.push(LogicalLine {
                content: std::mem::take(&mut buf),
                line_number: start_line,
                source: None,
            });
            pending = false;
        }

        // A trailing backslash on the very last physical line has nothing left to join with; flush
        // whatever was accumulated so it isn't silently dropped.
        if pending || !buf.is_empty() {
            result.push(LogicalLine {
                content: buf,
                line_number: start_line,
                source: None,
            });
        }

        Ok(result)
    }
}
