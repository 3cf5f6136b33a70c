//! CLI commands.

pub mod cache;
pub mod info;
pub mod model;
pub mod parse;
pub mod serve;
