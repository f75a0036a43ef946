pub mod cli;
pub mod config;
pub mod descriptor;
pub mod detector;
pub mod error;
mod metrics;
pub mod pipeline;
pub mod ranker;
pub mod searcher;
mod server;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use descriptor::{DESCRIPTOR_DIM, FaceDescriptor};
pub use detector::{CascadeDetector, FaceDetector, Region, WholeImageDetector};
pub use error::{FaceSearchError, Result};
pub use pipeline::{FileOutcome, IndexPipeline, IndexReport, SkipReason};
pub use ranker::{QueryResult, rank};
pub use searcher::Searcher;
pub use store::IndexEntry;
