pub mod app_state;
pub mod config;
pub mod db;
pub mod handlers;
pub mod server;
