pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod schema;

#[cfg(test)]
mod testing;
