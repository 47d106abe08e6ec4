pub mod analytics;
pub mod assets;
pub mod avatars;
pub mod config;
pub mod database;
pub mod errors;
pub mod extractor;
pub mod models;
pub mod refresh;
pub mod utils;
pub mod web;
