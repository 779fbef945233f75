//! Database bootstrap shared by JMA tools

pub mod init;

pub use init::{init_database, open_pool};
