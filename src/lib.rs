//! Terminal menu picker: resolves a list of dish names from operator text,
//! a built-in menu, or table records, then cycles through them until stopped.

pub mod app;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod format;
pub mod logging;
pub mod resolver;
pub mod selection;
pub mod source;
pub mod timers;
pub mod ui;
pub mod value;
