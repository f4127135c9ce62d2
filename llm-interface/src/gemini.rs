use engager_core::{Candidate, CoreError, Discovery, DiscoveryError, DiscoveryProvider};
use serde::Deserialize;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread entry as emitted by the discovery prompt.
#[derive(Debug, Deserialize)]
struct DiscoveredThread {
    subreddit: Option<String>,
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    relevance_score: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

impl DiscoveredThread {
    fn into_candidate(self) -> Option<Candidate> {
        let subreddit = self.subreddit.filter(|s| !s.trim().is_empty())?;
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        Some(Candidate {
            subreddit,
            title,
            url: self.url.filter(|u| !u.trim().is_empty()),
            keywords: self.keywords,
            relevance: self.relevance_score,
            reason: self.reason,
        })
    }
}

/// Discovery through the Gemini command line tool: the prompt goes in on stdin
/// and a JSON document listing threads comes back on stdout.
#[derive(Debug, Clone)]
pub struct GeminiCli {
    cli_path: String,
    timeout: Duration,
}

impl GeminiCli {
    pub fn new(cli_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cli_path: cli_path.into(),
            timeout,
        }
    }

    pub fn cli_path(&self) -> &str {
        &self.cli_path
    }

    fn spawn_error(&self, error: std::io::Error) -> CoreError {
        if error.kind() == ErrorKind::NotFound {
            DiscoveryError::CliNotFound {
                cli_path: self.cli_path.clone(),
            }
            .into()
        } else {
            CoreError::Io(error)
        }
    }

    /// Run `<cli> --version` and return what it printed.
    pub async fn check_connection(&self) -> Result<String, CoreError> {
        let output = Command::new(&self.cli_path)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(VERSION_CHECK_TIMEOUT, output)
            .await
            .map_err(|_| DiscoveryError::CliTimeout {
                seconds: VERSION_CHECK_TIMEOUT.as_secs(),
            })?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(DiscoveryError::CliFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("Gemini CLI available ({})", version);
        Ok(version)
    }

    async fn run(&self, prompt: &str) -> Result<String, CoreError> {
        let mut child = Command::new(&self.cli_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdin = child.stdin.take().ok_or_else(|| CoreError::Internal {
            message: "discovery CLI stdin was not captured".to_string(),
        })?;

        let feed = async move {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await
        };
        let execution = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = tokio::time::timeout(self.timeout, execution)
            .await
            .map_err(|_| {
                error!("Gemini CLI timed out after {:?}", self.timeout);
                DiscoveryError::CliTimeout {
                    seconds: self.timeout.as_secs(),
                }
            })?;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("Gemini CLI error: {}", stderr);
            return Err(DiscoveryError::CliFailed {
                code: output.status.code(),
                stderr,
            }
            .into());
        }
        // A CLI that exits early without reading its input is fine as long as it succeeded.
        if let Err(e) = fed {
            debug!("Gemini CLI closed stdin early: {}", e);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl DiscoveryProvider for GeminiCli {
    async fn discover(&self, prompt: &str) -> Result<Discovery, CoreError> {
        if prompt.trim().is_empty() {
            return Err(DiscoveryError::EmptyPrompt.into());
        }

        info!("Querying Gemini CLI for relevant threads...");
        let raw_response = self.run(prompt).await?;
        debug!(
            "Gemini raw response: {}",
            raw_response.chars().take(500).collect::<String>()
        );

        let candidates = parse_discovery_output(&raw_response)?;
        info!("Gemini discovered {} relevant threads", candidates.len());
        Ok(Discovery {
            candidates,
            raw_response,
        })
    }
}

/// Pull the JSON object out of free-form CLI output and read its `threads` array.
///
/// Entries without a subreddit or title are dropped.
pub fn parse_discovery_output(raw: &str) -> Result<Vec<Candidate>, CoreError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            warn!("No JSON found in Gemini response");
            return Err(DiscoveryError::NoJson {
                raw: raw.to_string(),
            }
            .into());
        }
    };

    let document: serde_json::Value =
        serde_json::from_str(json).map_err(|e| DiscoveryError::MalformedJson {
            details: e.to_string(),
            raw: raw.to_string(),
        })?;

    let entries = match document.get("threads") {
        Some(serde_json::Value::Array(entries)) => entries.clone(),
        Some(_) => {
            return Err(DiscoveryError::MalformedJson {
                details: "`threads` is not an array".to_string(),
                raw: raw.to_string(),
            }
            .into())
        }
        None => Vec::new(),
    };

    let candidates = entries
        .into_iter()
        .filter_map(|entry| {
            let parsed = serde_json::from_value::<DiscoveredThread>(entry.clone())
                .ok()
                .and_then(DiscoveredThread::into_candidate);
            if parsed.is_none() {
                warn!("Invalid thread structure: {}", entry);
            }
            parsed
        })
        .collect();

    Ok(candidates)
}
