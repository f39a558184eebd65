//! CLI subcommands

pub mod init;
pub mod list;
pub mod render;
pub mod slug;
