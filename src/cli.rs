use clap::Parser;

/// Post flagged-revision review digests for wiki categories to chat channels
#[derive(Parser, Debug, Clone)]
#[command(name = "patrold", version, about)]
pub struct Cli {
    /// Path to config file (.toml, or .json for a plain list of jobs)
    #[arg(long)]
    pub config: Option<String>,

    /// Build and send every report once, then exit (default)
    #[arg(long)]
    pub once: bool,

    /// Keep running, sending reports every `poll_hours`
    #[arg(long, conflicts_with = "once")]
    pub continuous: bool,

    /// Print reports to stdout instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Only run jobs with this name or channel id (repeatable)
    #[arg(long = "job", value_name = "NAME|CHANNEL")]
    pub job: Vec<String>,
}
