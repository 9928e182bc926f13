//! # samedit
//!
//! ## Overview
//!
//! This crate implements the structural command engine of a modal text
//! editor: a dialect of Rob Pike's *sam* command language layered with the
//! familiar `:`-style editor commands.
//!
//! A one-line command such as `,x/foo/ c/bar/` or `5,10d` is lexed into a
//! typed [token stream](lex::TokenStream), an optional address expression is
//! parsed and evaluated per active cursor to a byte range over the buffer,
//! and the remainder dispatches as one or more commands, possibly nested in
//! loops (`x`, `y`, `g`, `v`, `X`, `Y`) and groups (`{…}`). Commands never
//! mutate text directly; they enqueue deferred [changes](transcript::Change)
//! into a per-file [transcript](transcript::Transcript) which is validated,
//! ordered, and applied atomically once the whole line has executed, after
//! which selections are re-anchored against the shifted positions.
//!
//! The entry point is [Editor::sam_cmd](editor::Editor::sam_cmd).

// Require docs for public APIs, and disable the more annoying clippy lints.
#![deny(missing_docs)]
#![allow(clippy::bool_to_int_with_if)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::match_like_matches_macro)]
#![allow(clippy::needless_return)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod address;
pub mod commands;
pub mod editing;
pub mod editor;
pub mod errors;
pub mod lex;
pub mod options;
pub mod transcript;
