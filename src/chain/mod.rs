//! Chain Module
//!
//! Traversal of singly-linked block chains.
//!
//! ## Responsibilities
//! - Visit each block of a chain, re-reading every header from disk
//! - Find the tail of a chain
//! - Attach a block to a parent without overwriting an existing link
//!
//! ```text
//!  start ──▶ [hdr|payload] ──next──▶ [hdr|payload] ──next──▶ [hdr|payload] ──▶ 0
//!                                                                 (tail)
//! ```
//!
//! Reaching the tail is a normal way for a walk to end and is reported as
//! `WalkEnd::Tail`, not as an error.

mod walker;

pub use walker::WalkEnd;
