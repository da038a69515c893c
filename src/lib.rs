pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::SyncConfig;

pub use adapters::{CsvWorkbookSink, EutilsClient, EutilsSettings, LocalStorage};
pub use app::pipelines::{SyncPipeline, SyncSettings};
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
