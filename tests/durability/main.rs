//! Integration tests for commit durability.
//!
//! These tests interrupt writers at awkward points, damage files on disk,
//! and contend for the write lock, then check that the committed
//! generation is either fully visible or untouched.

#[path = "../common/mod.rs"]
mod common;

mod atomicity;
mod corruption;
mod locking;
