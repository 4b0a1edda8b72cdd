use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer};

pub const SERVICE_INTERVAL_FLOOR: Duration = Duration::from_secs(3);
pub const PACKAGE_INTERVAL_THRESHOLD: Duration = Duration::from_secs(30);
pub const PACKAGE_INTERVAL_FALLBACK: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default, rename = "username")]
    pub username: Option<String>,
    #[serde(default, rename = "workDirectory")]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub services: Vec<ServiceTarget>,
    #[serde(default)]
    pub packages: Vec<PackageTarget>,
}

/// A managed process whose liveness is polled. Nothing else is stored: whether it
/// runs is asked of the host every time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceTarget {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_interval")]
    pub interval: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageTarget {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_interval")]
    pub interval: Duration,
    #[serde(default, rename = "uriCheckVersion")]
    pub check_version_url: String,
    #[serde(default, rename = "uriDownloadPackage")]
    pub download_url: String,
    #[serde(default, rename = "workDirectory")]
    pub work_dir: String,
    #[serde(default, rename = "commandGetVersion")]
    pub version_command: String,
    #[serde(default, rename = "needShutdown")]
    pub needs_shutdown: bool,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
        }
    }

    pub fn effective_interval(&self) -> Duration {
        self.interval.max(SERVICE_INTERVAL_FLOOR)
    }

    /// Interval in scheduler ticks (one tick per second).
    pub fn interval_ticks(&self) -> u64 {
        self.effective_interval().as_secs().max(1)
    }
}

impl PackageTarget {
    pub fn is_eligible(&self) -> bool {
        !self.check_version_url.trim().is_empty()
            && !self.download_url.trim().is_empty()
            && !self.work_dir.trim().is_empty()
            && !self.version_command.trim().is_empty()
    }

    /// Anything configured below the threshold jumps to the fallback, not to the threshold.
    pub fn effective_interval(&self) -> Duration {
        if self.interval < PACKAGE_INTERVAL_THRESHOLD {
            PACKAGE_INTERVAL_FALLBACK
        } else {
            self.interval
        }
    }

    pub fn interval_ticks(&self) -> u64 {
        self.effective_interval().as_secs().max(1)
    }

    pub fn work_dir_path(&self) -> &Path {
        Path::new(self.work_dir.trim())
    }
}

impl DaemonConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(input).context("failed to parse daemon configuration")?;
        if config.name.trim().is_empty() {
            return Err(anyhow!("daemon configuration must set a non-empty 'name'"));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    pub fn find_package(&self, name: &str) -> Option<&PackageTarget> {
        self.packages.iter().find(|package| package.name == name)
    }
}

/// Config file names looked up next to the executable, in priority order.
pub fn config_candidates(exe_path: &Path) -> Vec<PathBuf> {
    let dir = exe_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = exe_path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("stagehand");
    vec![
        dir.join("config.yaml"),
        dir.join(format!("{stem}.yaml")),
        dir.join(format!("{stem}.conf")),
    ]
}

pub fn discover_config(exe_path: &Path) -> Option<PathBuf> {
    config_candidates(exe_path)
        .into_iter()
        .find(|candidate| candidate.is_file())
}

pub fn parse_interval(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Duration::ZERO);
    }
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(anyhow!("invalid interval '{input}': expected a number"));
        }
        let amount: u64 = rest[..digits_end]
            .parse()
            .with_context(|| format!("invalid interval '{input}'"))?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|ch: char| ch.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let part = match unit {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "h" => amount.checked_mul(60 * 60).map(Duration::from_secs),
            "" => return Err(anyhow!("invalid interval '{input}': missing unit")),
            other => return Err(anyhow!("invalid interval '{input}': unknown unit '{other}'")),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| anyhow!("invalid interval '{input}': too large"))?;
    }

    Ok(total)
}

fn deserialize_interval<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInterval {
        Seconds(u64),
        Text(String),
    }

    match RawInterval::deserialize(deserializer)? {
        RawInterval::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
        RawInterval::Text(text) => parse_interval(&text).map_err(serde::de::Error::custom),
    }
}
