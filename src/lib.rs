#![recursion_limit = "256"]

pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod train;
