//! # UI collaborator
//!
//! ## Overview
//!
//! Rendering is outside the engine; the [Ui] trait is the narrow surface
//! the engine needs from whatever hosts it: a one-line status message, the
//! escape-sequence wait time, and the window layout. Tests and headless
//! embedders use [CapturingUi].

/// Window layout directions selectable with `:set layout`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layout {
    /// Windows stacked top to bottom.
    Horizontal,

    /// Windows side by side.
    Vertical,
}

/// The engine's view of the hosting UI.
pub trait Ui {
    /// Show a one-line informational message.
    fn info_show(&mut self, msg: &str);

    /// Set the time to wait when disambiguating escape sequences.
    fn set_key_wait(&mut self, _ms: i64) {}

    /// Arrange windows in the given layout.
    fn arrange(&mut self, _layout: Layout) {}
}

/// A [Ui] that records everything it is told; the default for headless use.
#[derive(Debug, Default)]
pub struct CapturingUi {
    /// Messages shown so far, oldest first.
    pub messages: Vec<String>,

    /// The last requested layout.
    pub layout: Option<Layout>,

    /// The last requested key wait time.
    pub key_wait: Option<i64>,
}

impl Ui for CapturingUi {
    fn info_show(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn set_key_wait(&mut self, ms: i64) {
        self.key_wait = Some(ms);
    }

    fn arrange(&mut self, layout: Layout) {
        self.layout = Some(layout);
    }
}
