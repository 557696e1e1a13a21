#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod error;
pub mod feed;
pub mod humanize;
pub mod logging;
pub mod navigator;
pub mod refresh;
pub mod state;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
