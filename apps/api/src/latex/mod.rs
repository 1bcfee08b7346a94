//! Free-form LaTeX documents kept per user. Storage only; nothing is compiled.

pub mod handlers;
