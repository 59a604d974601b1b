pub mod migrations;
mod sqlite;

pub use sqlite::{
    CodeFileFilter, LearningFilter, MergeReport, PurgeScope, Store, StoreStats, SymbolFilter,
};
