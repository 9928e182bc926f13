//! # Error Types
//!
//! ## Overview
//!
//! Errors in the command engine are data, not control flow: parsers append
//! diagnostics to an [ErrorLog] with a caret pointing into the offending
//! position of the raw line, transcript conflicts are recorded on the file,
//! and handler failures propagate as booleans so the outer loop can still
//! flush per-file state.

use crate::lex::TokenStream;

/// Errors reported while parsing or executing a sam command line.
#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SamError {
    /// Failure to allocate working memory.
    #[error("Out of memory")]
    Memory,

    /// An address expression did not evaluate to a usable range.
    #[error("Bad address")]
    Address,

    /// An address was given to a command that takes none.
    #[error("Command takes no address")]
    NoAddress,

    /// Unbalanced `{`/`}` in the command line.
    #[error("Unmatched `}}'")]
    UnmatchedBrace,

    /// A regular expression failed to compile.
    #[error("Bad regular expression")]
    Regex,

    /// A delimited text argument was malformed.
    #[error("Bad text")]
    Text,

    /// A shell command argument was expected.
    #[error("Shell command expected")]
    Shell,

    /// The command name did not resolve in the registry.
    #[error("Unknown command")]
    Command,

    /// A handler reported failure.
    #[error("Error executing command")]
    Execute,

    /// A newline was expected.
    #[error("Newline expected")]
    Newline,

    /// An invalid mark name was given.
    #[error("Invalid mark")]
    Mark,

    /// Two queued changes cover overlapping ranges.
    #[error("Conflicting changes")]
    Conflict,

    /// A write was attempted while changes are queued for the file.
    #[error("Can not write while changing")]
    WriteConflict,

    /// A destructive command was reached after a looping construct.
    #[error("Destructive command in looping construct")]
    LoopInvalidCmd,

    /// A destructive command appeared inside a `{…}` group.
    #[error("Destructive command in group")]
    GroupInvalidCmd,

    /// A count argument was out of range.
    #[error("Invalid count")]
    Count,
}

/// Diagnostic log for a command line, rendered with a caret into the input.
#[derive(Clone, Debug, Default)]
pub struct ErrorLog {
    buf: String,
}

impl ErrorLog {
    /// Append a diagnostic pointing at byte `at` of the stream's raw line.
    pub fn report(&mut self, stream: &TokenStream, at: usize, msg: &str) {
        let raw = stream.raw();
        let padding = at.min(raw.len());

        self.buf.push_str("---Sam Error---\n");
        self.buf.push_str(raw);
        self.buf.push('\n');
        for _ in 0..padding {
            self.buf.push(' ');
        }
        self.buf.push_str("^\n");
        for _ in 0..padding {
            self.buf.push(' ');
        }
        self.buf.push_str(msg);
        self.buf.push('\n');
    }

    /// The accumulated log contents.
    pub fn contents(&self) -> &str {
        &self.buf
    }

    /// Whether anything has been reported since the last [clear](Self::clear).
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard the accumulated log.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_caret_position() {
        let stream = TokenStream::lex("1,2x");
        let mut log = ErrorLog::default();

        log.report(&stream, 3, "unknown command");

        let mut lines = log.contents().lines();
        assert_eq!(lines.next(), Some("---Sam Error---"));
        assert_eq!(lines.next(), Some("1,2x"));
        assert_eq!(lines.next(), Some("   ^"));
        assert_eq!(lines.next(), Some("   unknown command"));
    }

    #[test]
    fn test_report_past_end_clamps() {
        let stream = TokenStream::lex("ab");
        let mut log = ErrorLog::default();

        log.report(&stream, 100, "boom");
        assert!(log.contents().contains("\n  ^\n"));
    }
}
