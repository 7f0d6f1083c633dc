pub mod batch;
pub mod config;
pub mod constants;
pub mod equivalence;
pub mod error;
pub mod learning;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod parser;
pub mod storage;
pub mod types;

pub use batch::{BatchAcronymProcessor, MergedAcronymResult};
pub use error::{Result, VenueError};
pub use learning::AbbreviationLearner;
pub use normalize::{NormalizedVenue, TextNormalizer};
pub use storage::AcronymStore;
