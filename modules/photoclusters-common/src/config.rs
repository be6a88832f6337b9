use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;

/// Pagination and retry policy for the feed crawler.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSettings {
    /// New submissions to collect per subreddit per run.
    pub target: usize,
    pub page_size: u32,
    /// Pause after every successful search call.
    pub request_delay: Duration,
    /// Consecutive failed calls tolerated before the crawl gives up.
    pub max_retries: u32,
    /// Pause before retry N; the last entry repeats.
    pub backoff_schedule: Vec<Duration>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            target: 500,
            page_size: 500,
            request_delay: Duration::from_secs(3),
            max_retries: 5,
            backoff_schedule: vec![Duration::from_secs(5); 5],
        }
    }
}

impl CrawlSettings {
    /// Delay before the `attempt`-th retry (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let last = self.backoff_schedule.len().saturating_sub(1);
        self.backoff_schedule
            .get((attempt as usize).min(last))
            .copied()
            .unwrap_or_default()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub photo_root: PathBuf,
    /// `None` means "every subreddit already in the store".
    pub subreddits: Option<Vec<String>>,
    pub pushshift_base_url: String,
    pub crawl: CrawlSettings,
    pub min_photo_bytes: i64,
    pub cluster_sample_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults;
    /// set-but-unparsable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CrawlSettings::default();

        let subreddits = match lookup("SUBREDDITS") {
            Some(raw) => {
                let subs: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                if subs.is_empty() {
                    return Err(ConfigError::Empty("SUBREDDITS"));
                }
                Some(subs)
            }
            None => None,
        };

        let backoff_schedule = match lookup("CRAWL_BACKOFF_SECS") {
            Some(raw) => {
                let schedule = raw
                    .split(',')
                    .map(|s| {
                        s.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                            ConfigError::Invalid {
                                key: "CRAWL_BACKOFF_SECS",
                                expected: "a comma-separated list of seconds",
                                value: raw.clone(),
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if schedule.is_empty() {
                    return Err(ConfigError::Empty("CRAWL_BACKOFF_SECS"));
                }
                schedule
            }
            None => defaults.backoff_schedule,
        };

        let page_size: u32 = parse_or(&lookup, "CRAWL_PAGE_SIZE", defaults.page_size)?;
        // A zero-size page reads as an exhausted source.
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CRAWL_PAGE_SIZE",
                expected: "a page size between 1 and 500",
                value: page_size.to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://PhotoClusters.db".to_string()),
            photo_root: lookup("PHOTO_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("photos")),
            subreddits,
            pushshift_base_url: lookup("PUSHSHIFT_BASE_URL")
                .unwrap_or_else(|| "https://api.pushshift.io".to_string()),
            crawl: CrawlSettings {
                target: parse_or(&lookup, "CRAWL_TARGET", defaults.target)?,
                page_size: page_size.min(500),
                request_delay: Duration::from_secs(parse_or(
                    &lookup,
                    "CRAWL_REQUEST_DELAY_SECS",
                    defaults.request_delay.as_secs(),
                )?),
                max_retries: parse_or(&lookup, "CRAWL_MAX_RETRIES", defaults.max_retries)?,
                backoff_schedule,
            },
            min_photo_bytes: parse_or(&lookup, "MIN_PHOTO_BYTES", 3000)?,
            cluster_sample_size: parse_or(&lookup, "CLUSTER_SAMPLE_SIZE", 5000)?,
        })
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        info!(
            database_url = %self.database_url,
            photo_root = %self.photo_root.display(),
            subreddits = ?self.subreddits,
            pushshift = %self.pushshift_base_url,
            crawl_target = self.crawl.target,
            page_size = self.crawl.page_size,
            max_retries = self.crawl.max_retries,
            min_photo_bytes = self.min_photo_bytes,
            sample_size = self.cluster_sample_size,
            "Configuration loaded"
        );
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            expected: "a number",
            value: raw,
        }),
        None => Ok(default),
    }
}
