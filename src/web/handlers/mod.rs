//! HTML, form and asset handlers

pub mod cookies;
pub mod dashboard;
pub mod export;
pub mod forms;
pub mod health;
pub mod static_assets;
