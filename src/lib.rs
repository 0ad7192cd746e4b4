//! Bizdir - A moderated business directory
//!
//! Visitors browse and search approved listings; businesses submit new
//! listings that administrators approve, reject or feature.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
