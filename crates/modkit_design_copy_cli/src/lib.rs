//! CLI library components for `modkit-design-copy`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod summary;
