//! Append-only version history of resume sections.
//!
//! The next number is computed inside the INSERT, and `(resume_id, version_number)`
//! is unique, so two concurrent saves cannot share a number; the loser gets a
//! conflict instead.

pub mod handlers;
