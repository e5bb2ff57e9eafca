#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod feed;
pub mod platform;
pub mod poller;
pub mod tracker;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
