pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod meals;
pub mod settings;
pub mod state;
pub mod stats;
pub mod storage;
pub mod vision;
