pub mod author_sync;
pub mod dedup;
pub mod detail;
pub mod etl;
pub mod matcher;
pub mod query;
pub mod reconcile;
pub mod retry;
pub mod search_name;
pub mod state;
pub mod window;

pub use crate::domain::model::{
    AuthorReport, ExtractResult, PublicationRecord, RawRecord, RunSummary, Section, Table,
    TrackedAuthor, TransformResult, WindowSpec,
};
pub use crate::domain::ports::{DetailFetcher, FetchedBatch, Pipeline, SearchClient, Storage, TableSink};
pub use crate::utils::error::Result;
