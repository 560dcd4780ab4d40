pub mod app;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod io;
pub mod middleware;
pub mod store;
pub mod types;
