//! CLI command implementations.

pub mod init;
pub mod record;
pub mod run;
pub mod serve;
pub mod status;
