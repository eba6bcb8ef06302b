//! CLI subcommands

pub mod optimize;
pub mod scan;
pub mod stop;
