//! Durable state for the poller.
//!
//! The only durable state is one [`Cursor`] per repository, written with
//! the write-to-temp-then-rename pattern in [`fsync`].

pub mod cursor;
pub mod fsync;

pub use cursor::{Cursor, CursorError, CursorStore, format_cursor, parse_cursor};
