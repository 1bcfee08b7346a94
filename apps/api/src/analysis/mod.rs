pub mod ats;
pub mod extract;
pub mod handlers;
pub mod keywords;
pub mod prompts;
pub mod recommendations;
