// src/lib.rs

//! Harvester: scheduled news ingestion for coffee-trade sources.
//!
//! Sources are read feed-first with a listing-page fallback, deduplicated by
//! canonical URL, kept in a rolling window, and browsed through a small
//! article catalog.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
