//! # Subprocess pipe
//!
//! ## Overview
//!
//! The pipe collaborator runs a shell command, feeding it an optional input
//! chunk and collecting stdout and stderr. The call blocks until the
//! subprocess exits; the engine checks the interrupt flag after it returns
//! and abandons the pending change if the user interrupted the wait.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

/// The outcome of one pipe invocation.
#[derive(Clone, Debug)]
pub struct PipeResult {
    /// Exit status of the subprocess (`-1` when killed by a signal).
    pub status: i32,

    /// Collected standard output.
    pub stdout: String,

    /// Collected standard error.
    pub stderr: String,
}

/// Run `command` under `shell -c`, writing `input` to its stdin when given.
pub fn pipe(shell: &str, command: &str, input: Option<&str>) -> io::Result<PipeResult> {
    let mut child = Command::new(shell)
        .arg("-c")
        .arg(command)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let writer = match (child.stdin.take(), input) {
        (Some(mut stdin), Some(input)) => {
            let input = input.to_string();
            Some(thread::spawn(move || {
                // the subprocess may exit without reading everything
                let _ = stdin.write_all(input.as_bytes());
            }))
        },
        _ => None,
    };

    let output = child.wait_with_output()?;
    if let Some(writer) = writer {
        let _ = writer.join();
    }

    Ok(PipeResult {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_stdin_to_stdout() {
        let out = pipe("/bin/sh", "cat", Some("hello\n")).unwrap();
        assert_eq!(out.status, 0);
        assert_eq!(out.stdout, "hello\n");
    }

    #[test]
    fn test_pipe_status() {
        let out = pipe("/bin/sh", "exit 3", None).unwrap();
        assert_eq!(out.status, 3);
    }

    #[test]
    fn test_pipe_stderr() {
        let out = pipe("/bin/sh", "echo oops >&2; false", None).unwrap();
        assert_eq!(out.status, 1);
        assert_eq!(out.stderr, "oops\n");
    }
}
