pub mod extract;
pub mod files;
