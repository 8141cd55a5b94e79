pub mod chain;
pub mod config;
pub mod error;
pub mod followers;
pub mod listeners;
pub mod models;
pub mod redis;
pub mod registry;
pub mod revival;
pub mod shutdown;
pub mod snapshots;
pub mod swaps;
