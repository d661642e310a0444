pub mod crypto;
pub mod file;
pub mod timeout;
