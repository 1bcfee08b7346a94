pub mod cache;
pub mod handlers;
