use crate::config::toml_config::DEFAULT_CONFIG_FILE;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "pubmed-sync")]
#[command(about = "Incrementally sync PubMed publications for a roster of tracked authors")]
pub struct CliArgs {
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE, help = "Settings file (TOML)")]
    pub config: PathBuf,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Manual window start (YYYY-MM-DD or YYYY/MM/DD); disables incremental state")]
    pub start: Option<String>,

    #[arg(long, help = "Manual window end, defaults to today")]
    pub end: Option<String>,

    #[arg(long, help = "Resolve the window and print each author's query without any network calls or writes")]
    pub dry_run: bool,
}
