//! Integration tests for indexing runs.
//!
//! Each test drives the public API the way the CLI does (open a writer,
//! walk a document tree, close) and checks the committed view through a
//! fresh reader.

#[path = "../common/mod.rs"]
mod common;

mod lifecycle;
mod malformed;
mod merge;
mod modes;
mod walk;
