pub mod api;
pub mod config;
pub mod db;
pub mod filter;
pub mod glpi;
pub mod report;
pub mod server;
pub mod session;

pub use config::Config;
