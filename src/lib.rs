//! rivalskins - hero skin catalog crawler.
//!
//! Crawls the game wiki for heroes and their skins, keeps the results in a
//! TTL file cache, and serves the cached catalog over a small JSON API.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod refresh;
pub mod scrapers;
pub mod server;
