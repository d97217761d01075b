use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::report::ReportLimits;
use crate::review::DEFAULT_BATCH_SIZE;
use crate::sources::SourceSpec;

pub const DEFAULT_CONFIG_PATH: &str = "patrold.toml";
pub const DEFAULT_API_URL: &str = "https://ru.wikipedia.org/w/api.php";
pub const DEFAULT_SITE_URL: &str = "https://ru.wikipedia.org";
pub const DEFAULT_DISCORD_API: &str = "https://discord.com/api/v10";
/// MediaWiki's per-request title limit for accounts with `apihighlimits`.
pub const MAX_BATCH_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// File representation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub discord: DiscordSection,
    #[serde(default)]
    pub report: ReportSection,
    #[serde(default)]
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub site_url: Option<String>,
    pub user_agent: Option<String>,
    pub username_env: Option<String>,
    pub password_env: Option<String>,
    pub assert_bot: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct DiscordSection {
    pub token_env: Option<String>,
    pub token_file: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ReportSection {
    pub batch_size: Option<usize>,
    pub max_stale_results: Option<usize>,
    pub max_unreviewed_results: Option<usize>,
    pub cutoff_hours: Option<u64>,
    pub poll_hours: Option<u64>,
}

/// Channel ids are snowflakes; accept them quoted or bare.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChannelRef {
    Id(u64),
    Name(String),
}

impl ChannelRef {
    fn into_string(self) -> String {
        match self {
            ChannelRef::Id(id) => id.to_string(),
            ChannelRef::Name(name) => name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JobEntry {
    pub channel: ChannelRef,
    pub name: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    /// Older single-category form: talk pages of the category, reported as
    /// their subject pages.
    pub category: Option<String>,
}


// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WikiConfig {
    pub api_url: String,
    pub site_url: String,
    pub user_agent: String,
    pub username_env: String,
    pub password_env: String,
    pub assert_bot: bool,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            user_agent: format!("patrold/{}", env!("CARGO_PKG_VERSION")),
            username_env: "PATROLD_WIKI_USER".to_string(),
            password_env: "PATROLD_WIKI_PASSWORD".to_string(),
            assert_bot: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscordConfig {
    pub token_env: String,
    pub token_file: Option<PathBuf>,
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_env: "PATROLD_DISCORD_TOKEN".to_string(),
            token_file: None,
            api_base: DEFAULT_DISCORD_API.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub batch_size: usize,
    pub limits: ReportLimits,
    pub cutoff_hours: u64,
    pub poll_hours: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            limits: ReportLimits::default(),
            cutoff_hours: 24,
            poll_hours: 24,
        }
    }
}

/// One report destination and the pages it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportJob {
    pub channel: String,
    pub name: Option<String>,
    pub sources: Vec<SourceSpec>,
}

impl ReportJob {
    /// Name for logs: the configured name, else the channel id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.channel)
    }

    fn matches(&self, selector: &str) -> bool {
        self.channel == selector || self.name.as_deref() == Some(selector)
    }
}

impl From<JobEntry> for ReportJob {
    fn from(entry: JobEntry) -> Self {
        let mut sources = entry.sources;
        if let Some(category) = entry.category {
            sources.push(SourceSpec {
                namespaces: Some(vec![1]),
                detalkify: Some(true),
                ..SourceSpec::category(&category)
            });
        }
        Self {
            channel: entry.channel.into_string(),
            name: entry.name,
            sources,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub wiki: WikiConfig,
    pub discord: DiscordConfig,
    pub report: ReportConfig,
    pub jobs: Vec<ReportJob>,
    pub dry_run: bool,
    pub continuous: bool,
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = Path::new(cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));
        if !config_path.exists() {
            return Err(Error::ConfigNotFound(config_path.to_path_buf()));
        }
        let content = std::fs::read_to_string(config_path)?;
        let file_config = if is_json(config_path) {
            parse_json_config(&content)?
        } else {
            parse_config(&content)?
        };
        merge(file_config, cli)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// JSON configs are either a bare list of jobs or a full config object.
pub fn parse_json_config(content: &str) -> Result<ConfigFile> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let config = if value.is_array() {
        ConfigFile {
            jobs: serde_json::from_value(value)?,
            ..Default::default()
        }
    } else {
        serde_json::from_value(value)?
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ConfigFile) -> Result<()> {
    if config.jobs.is_empty() {
        return Err(Error::ConfigValidation("no jobs configured".to_string()));
    }
    for (index, job) in config.jobs.iter().enumerate() {
        if matches!(&job.channel, ChannelRef::Name(name) if name.trim().is_empty()) {
            return Err(Error::ConfigValidation(format!(
                "job {index}: channel must not be empty"
            )));
        }
    }

    let report = &config.report;
    if let Some(size) = report.batch_size
        && !(1..=MAX_BATCH_SIZE).contains(&size)
    {
        return Err(Error::ConfigValidation(format!(
            "batch_size must be between 1 and {MAX_BATCH_SIZE}"
        )));
    }
    if report.max_stale_results == Some(0) {
        return Err(Error::ConfigValidation(
            "max_stale_results must be > 0".to_string(),
        ));
    }
    if report.cutoff_hours == Some(0) {
        return Err(Error::ConfigValidation(
            "cutoff_hours must be > 0".to_string(),
        ));
    }
    if report.poll_hours == Some(0) {
        return Err(Error::ConfigValidation(
            "poll_hours must be > 0".to_string(),
        ));
    }
    Ok(())
}

pub fn merge(file: ConfigFile, cli: &Cli) -> Result<Config> {
    let wiki_defaults = WikiConfig::default();
    let wiki = WikiConfig {
        api_url: file.wiki.api_url.unwrap_or(wiki_defaults.api_url),
        site_url: file.wiki.site_url.unwrap_or(wiki_defaults.site_url),
        user_agent: file.wiki.user_agent.unwrap_or(wiki_defaults.user_agent),
        username_env: file.wiki.username_env.unwrap_or(wiki_defaults.username_env),
        password_env: file.wiki.password_env.unwrap_or(wiki_defaults.password_env),
        assert_bot: file.wiki.assert_bot.unwrap_or(wiki_defaults.assert_bot),
    };

    let discord_defaults = DiscordConfig::default();
    let discord = DiscordConfig {
        token_env: file.discord.token_env.unwrap_or(discord_defaults.token_env),
        token_file: file.discord.token_file.map(PathBuf::from),
        api_base: file.discord.api_base.unwrap_or(discord_defaults.api_base),
    };

    let report_defaults = ReportConfig::default();
    let report = ReportConfig {
        batch_size: file.report.batch_size.unwrap_or(report_defaults.batch_size),
        limits: ReportLimits {
            max_stale_results: file
                .report
                .max_stale_results
                .unwrap_or(report_defaults.limits.max_stale_results),
            max_unreviewed_results: file
                .report
                .max_unreviewed_results
                .unwrap_or(report_defaults.limits.max_unreviewed_results),
        },
        cutoff_hours: file
            .report
            .cutoff_hours
            .unwrap_or(report_defaults.cutoff_hours),
        poll_hours: file.report.poll_hours.unwrap_or(report_defaults.poll_hours),
    };

    let mut jobs: Vec<ReportJob> = file.jobs.into_iter().map(ReportJob::from).collect();
    if !cli.job.is_empty() {
        jobs.retain(|job| cli.job.iter().any(|sel| job.matches(sel)));
        if jobs.is_empty() {
            return Err(Error::ConfigValidation(format!(
                "no configured job matches --job {}",
                cli.job.join(", ")
            )));
        }
    }

    Ok(Config {
        wiki,
        discord,
        report,
        jobs,
        dry_run: cli.dry_run,
        continuous: cli.continuous,
    })
}
