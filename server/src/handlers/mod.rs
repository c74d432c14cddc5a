pub mod extract_handlers;
pub mod file_handlers;
