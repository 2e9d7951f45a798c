//! Shared utility functions for fix-forge.
//!
//! Text helpers used by the assembler, the candidate extractor and the
//! progress output of the repair loop.

pub mod text;

pub use text::{dedent, strip_newlines, truncate, DEFAULT_TRUNCATE_CHARS};
