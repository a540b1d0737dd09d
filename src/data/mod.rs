pub mod acquirer;
pub mod cache;
pub mod observer;
pub mod orchestrator;
pub mod report;
pub mod validator;

pub use acquirer::{Acquirer, SeriesSource};
pub use cache::{CacheKey, CacheStore, FileCacheStore, MemoryCacheStore};
pub use observer::{LoadObserver, TracingObserver};
pub use orchestrator::{AcquisitionResult, Orchestrator, SymbolFailure, SymbolSelection};
pub use report::AcquisitionSummary;
pub use validator::SeriesValidator;
