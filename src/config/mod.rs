use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::DownloadArgs;
use crate::download::RetryPolicy;
use crate::proxy::{ProxyConfig, ProxyFlags, WebshareEndpoint};

const LOCAL_CONFIG: &str = "yxd.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Download defaults
    pub download: DownloadConfig,

    /// Backoff for rate-limited and proxy failures
    pub retry: RetryConfig,

    /// Webshare rotating proxy endpoint
    pub webshare: WebshareConfig,

    /// External tools
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory transcripts are written to
    pub output_dir: PathBuf,

    /// Preferred transcript languages, first match wins
    pub languages: Vec<String>,

    /// Pause between two videos
    pub sleep_seconds: f64,

    /// Prefix each line with `[HH:MM:SS]`
    pub include_timestamps: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("subtitles"),
            languages: vec!["en".to_string()],
            sleep_seconds: 1.0,
            include_timestamps: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per video
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Relative jitter, 0.0 to 1.0
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            multiplier: policy.multiplier,
            jitter: policy.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebshareConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
}

impl Default for WebshareConfig {
    fn default() -> Self {
        let endpoint = WebshareEndpoint::default();
        Self {
            host: endpoint.host,
            port: endpoint.port,
            scheme: endpoint.scheme,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// yt-dlp executable, looked up on PATH unless absolute
    pub yt_dlp: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, or defaults when there is none
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // A file in the working directory wins
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("yxd").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let download = &self.download;
        if download.output_dir.as_os_str().is_empty() {
            anyhow::bail!("download.output_dir must not be empty");
        }
        if !download.sleep_seconds.is_finite() || download.sleep_seconds < 0.0 {
            anyhow::bail!("download.sleep_seconds must be a non-negative number");
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            anyhow::bail!("retry.max_delay_ms must not be smaller than retry.base_delay_ms");
        }
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            anyhow::bail!("retry.multiplier must be at least 1.0");
        }
        if !(0.0..=1.0).contains(&retry.jitter) {
            anyhow::bail!("retry.jitter must be between 0.0 and 1.0");
        }

        if self.webshare.host.trim().is_empty() {
            anyhow::bail!("webshare.host must not be empty");
        }
        if !matches!(self.webshare.scheme.as_str(), "http" | "https") {
            anyhow::bail!("webshare.scheme must be http or https, got {:?}", self.webshare.scheme);
        }

        if self.tools.yt_dlp.trim().is_empty() {
            anyhow::bail!("tools.yt_dlp must not be empty");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Output Directory: {}", self.download.output_dir.display());
        println!("  Languages: {}", self.download.languages.join(", "));
        println!("  Sleep Between Videos: {}s", self.download.sleep_seconds);
        println!("  Timestamps: {}", self.download.include_timestamps);
        println!(
            "  Retry: {} attempts, {}ms base delay, {}ms max delay, x{}, jitter {}",
            self.retry.max_attempts,
            self.retry.base_delay_ms,
            self.retry.max_delay_ms,
            self.retry.multiplier,
            self.retry.jitter
        );
        println!(
            "  Webshare Endpoint: {}://{}:{}",
            self.webshare.scheme, self.webshare.host, self.webshare.port
        );
        println!("  yt-dlp: {}", self.tools.yt_dlp);
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            multiplier: self.retry.multiplier,
            jitter: self.retry.jitter,
        }
    }

    pub fn webshare_endpoint(&self) -> WebshareEndpoint {
        WebshareEndpoint {
            scheme: self.webshare.scheme.clone(),
            host: self.webshare.host.clone(),
            port: self.webshare.port,
        }
    }

    /// Proxy flags of a download, Webshare endpoint overrides layered over the file
    pub fn proxy_flags(&self, args: &DownloadArgs) -> ProxyFlags {
        let defaults = self.webshare_endpoint();

        ProxyFlags {
            proxy_url: args.proxy_url.clone(),
            username: args.webshare_username.clone(),
            password: args.webshare_password.clone(),
            endpoint: WebshareEndpoint {
                scheme: args
                    .webshare_scheme
                    .map(|scheme| scheme.to_string())
                    .unwrap_or(defaults.scheme),
                host: args.webshare_host.clone().unwrap_or(defaults.host),
                port: args.webshare_port.unwrap_or(defaults.port),
            },
            no_prompt: args.no_webshare_prompt,
        }
    }
}

/// Settings of one run, fixed before the first video is touched
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Channel, handle, user page or playlist as given
    pub channel: String,
    pub output_dir: PathBuf,
    pub languages: Vec<String>,
    pub include_timestamps: bool,
    pub overwrite: bool,
    pub sleep: Duration,
    pub max_videos: Option<usize>,
    pub retry: RetryPolicy,
    pub proxy: ProxyConfig,
}

impl RunConfig {
    /// Command line flags layered over the config file
    pub fn from_args(args: &DownloadArgs, config: &Config, proxy: ProxyConfig) -> Result<Self> {
        let sleep_seconds = args.sleep.unwrap_or(config.download.sleep_seconds);
        let sleep = Duration::try_from_secs_f64(sleep_seconds)
            .with_context(|| format!("Invalid sleep interval: {}", sleep_seconds))?;

        let mut retry = config.retry_policy();
        if let Some(max_attempts) = args.max_attempts {
            if max_attempts == 0 {
                anyhow::bail!("--max-attempts must be at least 1");
            }
            retry.max_attempts = max_attempts;
        }

        let languages: Vec<String> = args
            .languages
            .clone()
            .unwrap_or_else(|| config.download.languages.clone())
            .into_iter()
            .map(|language| language.trim().to_string())
            .filter(|language| !language.is_empty())
            .collect();

        Ok(Self {
            channel: args.channel.trim().to_string(),
            output_dir: args
                .output_dir
                .clone()
                .unwrap_or_else(|| config.download.output_dir.clone()),
            languages,
            include_timestamps: config.download.include_timestamps && !args.no_timestamps,
            overwrite: args.overwrite,
            sleep,
            max_videos: args.max_videos,
            retry,
            proxy,
        })
    }
}
