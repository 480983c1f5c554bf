use std::time::Duration;
use std::{env, path::PathBuf};

pub mod cleanup;
pub mod clock;
pub mod error;
pub mod notifier;
pub mod persist;
pub mod renderer;
pub mod shared_cache;
pub mod storage;
pub mod tasks;
pub mod types;

pub use error::{StorageError, ToastError};
pub use notifier::Notifier;
pub use shared_cache::CacheSettings;
pub use types::{DisplayHandle, NotificationRecord, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dir: PathBuf,
    pub tasks: Option<PathBuf>,
    pub settings: CacheSettings,
    pub watch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            tasks: None,
            settings: CacheSettings::default(),
            watch: false,
        }
    }
}

impl Config {
    pub fn new() -> Result<Config, String> {
        Self::from_args(env::args().skip(1)) // Skip program name
    }

    pub fn from_args<I, S>(args: I) -> Result<Config, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut config = Config::default();

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            if flag == "--watch" {
                config.watch = true;
                i += 1;
                continue;
            }

            if i + 1 >= args.len() {
                return Err(format!("{} requires a value", flag));
            }
            let value = args[i + 1].as_str();

            match flag {
                "--dir" => config.dir = PathBuf::from(value),
                "--tasks" => config.tasks = Some(PathBuf::from(value)),
                "--min-interval-ms" => config.settings.min_interval = parse_millis(flag, value)?,
                "--retention-ms" => config.settings.retention = parse_millis(flag, value)?,
                "--sweep-interval-ms" => {
                    config.settings.sweep_interval = parse_millis(flag, value)?
                }
                "--duration-ms" => config.settings.default_duration = parse_millis(flag, value)?,
                _ => {
                    return Err(format!("Unknown argument: {}", flag));
                }
            }
            i += 2;
        }

        if config.settings.retention.is_zero() {
            return Err("--retention-ms must be greater than zero".to_string());
        }
        if config.settings.sweep_interval.is_zero() {
            return Err("--sweep-interval-ms must be greater than zero".to_string());
        }

        Ok(config)
    }
}

fn parse_millis(flag: &str, value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("{} expects milliseconds, got {:?}", flag, value))
}
