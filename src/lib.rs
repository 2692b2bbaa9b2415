//! Quire: a content-management core with interchangeable page storage
//! backends, tag-aware caching, and a small operational shell.

pub mod application;
pub mod cache;
pub mod config;
pub mod content;
pub mod domain;
pub mod infra;
pub mod util;
