pub mod access;
pub mod export;
pub mod handlers;
