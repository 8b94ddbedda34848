pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod hub;
pub mod logs;
pub mod platform;
pub mod ui;
