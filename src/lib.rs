pub mod config;
pub mod db;
pub mod fetch;
pub mod models;
pub mod poller;
pub mod processor;
