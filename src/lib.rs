// src/lib.rs

//! feedhook: forwards new feed entries and forum posts to Discord webhooks.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
