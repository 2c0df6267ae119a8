// Public modules
pub mod anchors;
pub mod canonical;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod io;
pub mod models;
pub mod relevance;
pub mod selection;
pub mod similarity;

// Re-export commonly used types
pub use canonical::canonicalize_url;
pub use config::{ConfigWarning, DigestConfig, EngineSettings, TopicConfig};
pub use engine::{DigestEngine, SelectionReport};
pub use io::{
    get_default_selections_dir, load_candidate_pool, load_selection, save_selection,
    selection_filename, PoolFile, SelectionFile,
};
pub use models::{
    CandidatePool, DedupStage, DuplicateGroup, FeedItem, SelectionResult, SelectionStats, TopicPool,
};
