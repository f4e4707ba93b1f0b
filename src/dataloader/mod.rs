pub mod config;
pub mod data_batch;
pub mod datasource;
pub mod error;
mod info;
pub mod provider;
