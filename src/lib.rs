pub mod alignment;
pub mod api_client;
pub mod colors;
pub mod commands;
pub mod comparison;
pub mod config;
pub mod context;
pub mod equity;
pub mod heatmap;
pub mod models;
pub mod param_space;
pub mod run_data;
pub mod sensitivity;
