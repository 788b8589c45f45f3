// THEORY:
// `WatchConfig` gathers the handful of knobs a deployment needs: where frames come
// from, where events go, how the window is named and which key ends the session.
// Values come from `SW_*` environment variables with sensible defaults; the
// harness may override individual fields from its command line afterwards.
//
// Lookup goes through an injectable function so that tests can describe an
// environment without mutating the real one.

use crate::error::{WatchError, WatchResult};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATABASE: &str = "signal_watch.db";
pub const DEFAULT_WINDOW: &str = "VideoStream";
pub const DEFAULT_QUIT_KEY: char = 'q';
pub const DEFAULT_MAX_MISSES: u32 = 300;

/// Where frames are captured from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A capture device by index.
    Camera(i32),
    /// A recorded video file, played once.
    File(PathBuf),
}

impl FromStr for SourceSpec {
    type Err = WatchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(WatchError::Config("frame source must not be empty".into()));
        }
        Ok(match raw.parse::<i32>() {
            Ok(index) => SourceSpec::Camera(index),
            Err(_) => SourceSpec::File(PathBuf::from(raw)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub source: SourceSpec,
    /// SQLite file receiving transition events.
    pub database_path: PathBuf,
    pub window_name: String,
    /// The key that ends the loop.
    pub quit_key: char,
    /// If set, the annotated stream is also written to this video file.
    pub record_path: Option<PathBuf>,
    /// Consecutive frame misses after which the source is considered lost.
    pub max_consecutive_misses: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            source: SourceSpec::Camera(0),
            database_path: PathBuf::from(DEFAULT_DATABASE),
            window_name: DEFAULT_WINDOW.to_string(),
            quit_key: DEFAULT_QUIT_KEY,
            record_path: None,
            max_consecutive_misses: DEFAULT_MAX_MISSES,
        }
    }
}

impl WatchConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> WatchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    pub fn from_lookup<F>(lookup: F) -> WatchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = WatchConfig::default();

        if let Some(source) = get("SW_SOURCE") {
            config.source = source.parse()?;
        }
        if let Some(path) = get("SW_DATABASE") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(name) = get("SW_WINDOW") {
            config.window_name = name;
        }
        if let Some(key) = get("SW_QUIT_KEY") {
            config.quit_key = parse_quit_key(&key)?;
        }
        if let Some(path) = get("SW_RECORD") {
            config.record_path = Some(PathBuf::from(path));
        }
        if let Some(misses) = get("SW_MAX_MISSES") {
            config.max_consecutive_misses = misses.trim().parse().map_err(|_| {
                WatchError::Config(format!("SW_MAX_MISSES must be a non-negative integer, got {misses:?}"))
            })?;
        }

        Ok(config)
    }
}

fn parse_quit_key(raw: &str) -> WatchResult<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) if key.is_ascii() => Ok(key),
        _ => Err(WatchError::Config(format!(
            "SW_QUIT_KEY must be a single ASCII character, got {raw:?}"
        ))),
    }
}
