//! CLI library components for invoice extraction and field mapping.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod settings;
