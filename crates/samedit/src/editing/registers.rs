//! # Register storage
//!
//! ## Overview
//!
//! Registers carry values between commands: the dedicated shell register
//! (the last `!`/`|`/`<`/`>` command, reused when a pipe command is given
//! without an argument), the capture registers `$0..$9` published by `x`
//! and `y` before each recursion, and general named cells.

use std::collections::HashMap;

/// Addressable register names.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Register {
    /// The last shell command given to a pipe command.
    Shell,

    /// Capture register `$n`; `0` is the whole-match (ampersand) register.
    Capture(u8),

    /// A general purpose named register.
    Named(char),
}

/// Storage for [Register] values.
#[derive(Clone, Debug, Default)]
pub struct RegisterStore {
    shell: String,
    captures: [String; 10],
    named: HashMap<char, String>,
}

impl RegisterStore {
    /// Read a register; empty registers read as `None`.
    pub fn get(&self, reg: Register) -> Option<&str> {
        let value = match reg {
            Register::Shell => &self.shell,
            Register::Capture(n) => self.captures.get(n as usize)?,
            Register::Named(c) => self.named.get(&c)?,
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Write a register.
    pub fn put(&mut self, reg: Register, value: String) {
        match reg {
            Register::Shell => self.shell = value,
            Register::Capture(n) => {
                if let Some(slot) = self.captures.get_mut(n as usize) {
                    *slot = value;
                }
            },
            Register::Named(c) => {
                self.named.insert(c, value);
            },
        }
    }

    /// Publish the text of capture group `n` of a match; an unmatched group
    /// clears the register.
    pub fn put_capture(&mut self, n: u8, text: Option<&str>) {
        if let Some(slot) = self.captures.get_mut(n as usize) {
            slot.clear();
            if let Some(text) = text {
                slot.push_str(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_register_round_trip() {
        let mut regs = RegisterStore::default();
        assert_eq!(regs.get(Register::Shell), None);

        regs.put(Register::Shell, "wc -l".into());
        assert_eq!(regs.get(Register::Shell), Some("wc -l"));
    }

    #[test]
    fn test_captures() {
        let mut regs = RegisterStore::default();
        regs.put_capture(0, Some("whole"));
        regs.put_capture(1, Some("part"));
        regs.put_capture(2, None);

        assert_eq!(regs.get(Register::Capture(0)), Some("whole"));
        assert_eq!(regs.get(Register::Capture(1)), Some("part"));
        assert_eq!(regs.get(Register::Capture(2)), None);
    }
}
