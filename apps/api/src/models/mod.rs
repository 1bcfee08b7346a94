pub mod analysis;
pub mod comment;
pub mod job;
pub mod latex_document;
pub mod resume;
pub mod template;
pub mod user;
pub mod version;
