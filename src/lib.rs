// src/lib.rs

pub mod api;
pub mod app_state;
pub mod codec;
pub mod config;
pub mod error;
pub mod metadata;
pub mod record;
pub mod repository;
pub mod storage;
pub mod transform;
