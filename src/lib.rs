pub mod age;
pub mod ai;
pub mod app;
pub mod db;
pub mod fetcher;
pub mod gate;
pub mod keyword;
pub mod orchestrator;
pub mod parser;
pub mod registry;
pub mod store;
pub mod types;

pub use ai::{AiGateway, Classifier, RemoteClassifier};
pub use app::{FeedSift, RefreshReport};
pub use db::SqliteStore;
pub use fetcher::{FetchOutcome, Fetcher};
pub use gate::{Clock, RefreshGate, SystemClock};
pub use orchestrator::{FilterOrchestrator, ViewQuery, ViewResult};
pub use registry::SourceRegistry;
pub use store::{ItemStore, MemoryStore};
pub use types::*;
