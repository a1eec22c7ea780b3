#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod rewrite;
pub mod schema;
pub mod service;
pub mod session;
pub mod sqlite;
pub mod tool;
pub mod utils;

pub use cli::app::{Cli, Command};
