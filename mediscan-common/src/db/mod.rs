//! Database schema and connection setup

pub mod init;

pub use init::init_database;
