pub mod eutils;
pub mod sink;
pub mod storage;

pub use eutils::{EutilsClient, EutilsSettings};
pub use sink::CsvWorkbookSink;
pub use storage::LocalStorage;
