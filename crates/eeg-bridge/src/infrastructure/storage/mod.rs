//! Storage infrastructure: the optional configuration file.

pub mod config;
