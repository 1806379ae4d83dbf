// src/lib.rs

pub mod cache;
pub mod config;
pub mod eventbus;
pub mod platforms;
pub mod services;
pub mod tasks;
pub mod utils;

pub use chatwatch_common::error::Error;
pub use chatwatch_common::models;
