pub mod document;
pub mod process;
pub mod step;
pub mod user;
