pub mod classes;
pub mod comments;
pub mod core;
pub mod reports;
pub mod students;
pub mod templates;
pub mod writer;
