pub mod budget;
pub mod builder;
pub mod cli;
pub mod config;
pub mod database;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod hamming;
pub mod kmeans;
pub mod quality;
pub mod quantizer;
pub mod sparse;
pub mod tfidf;
pub mod utils;
pub mod vocabulary;

pub use builder::{IndexBuilder, TargetFeatures};
pub use config::Opts;
pub use database::{DatabaseFormat, TargetDatabase};
pub use error::BuildError;
