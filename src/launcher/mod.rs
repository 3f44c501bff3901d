//! Chromium process launch and endpoint discovery.
//!
//! [`Launcher`] spawns a Chromium with a throwaway profile, watches its
//! stderr for the DevTools endpoint banner, resolves the browser-level
//! WebSocket URL through `/json/version`, and hands back a connected
//! [`Browser`]. [`Launcher::attach`] skips the process entirely and
//! connects to an already-running endpoint.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::browser::Browser;
use crate::error::{Error, Result};
use crate::events::{EventSink, NullSink};
use crate::policy::NavigationPolicy;
use crate::transport::Connection;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable naming the Chromium executable.
pub const EXECUTABLE_ENV: &str = "CHROMIUM_AUTOMATON_EXECUTABLE_PATH";

/// Default deadline for the spawn-to-endpoint handshake (30s).
const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 30_000;

/// Stderr lines kept for the launch failure message.
const STDERR_TAIL_LINES: usize = 20;

static DEVTOOLS_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    // The banner format is stable across Chromium releases.
    Regex::new(r"DevTools listening on (ws://\S+)").unwrap()
});

// ============================================================================
// Launcher
// ============================================================================

/// Builder for launching or attaching to a Chromium instance.
pub struct Launcher {
    executable: Option<PathBuf>,
    headless: bool,
    extra_args: Vec<String>,
    launch_timeout_ms: u64,
    allow_file_urls: bool,
    sink: Arc<dyn EventSink>,
}

impl Default for Launcher {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            extra_args: Vec::new(),
            launch_timeout_ms: DEFAULT_LAUNCH_TIMEOUT_MS,
            allow_file_urls: false,
            sink: Arc::new(NullSink),
        }
    }
}

impl Launcher {
    /// Creates a launcher with defaults: headless, `file://` navigation
    /// disallowed, executable taken from [`EXECUTABLE_ENV`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Chromium executable path explicitly.
    #[must_use]
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Toggles headless mode (on by default).
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Appends one extra command-line argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Appends extra command-line arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the spawn-to-endpoint deadline.
    #[must_use]
    pub fn launch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.launch_timeout_ms = timeout_ms;
        self
    }

    /// Permits `file://` navigation on pages of this browser.
    #[must_use]
    pub fn allow_file_urls(mut self, allow: bool) -> Self {
        self.allow_file_urls = allow;
        self
    }

    /// Injects the sink receiving action/assertion events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    fn policy(&self) -> NavigationPolicy {
        NavigationPolicy::new(self.allow_file_urls)
    }

    /// Connects to an already-running browser endpoint.
    ///
    /// No process is supervised; [`Browser::close`] only closes the
    /// transport and runs cleanups.
    ///
    /// # Errors
    ///
    /// Connection errors from the WebSocket handshake.
    pub async fn attach(self, ws_url: &str) -> Result<Browser> {
        let connection = Connection::connect(ws_url).await?;
        let policy = self.policy();
        Ok(Browser::assemble(connection, None, self.sink, policy))
    }

    /// Spawns Chromium and connects to its browser-level endpoint.
    ///
    /// The instance gets a fresh temporary profile directory, removed
    /// again when the returned [`Browser`] is closed.
    ///
    /// # Errors
    ///
    /// - [`Error::ExecutableNotFound`] if no executable is configured
    ///   or the configured one does not exist.
    /// - [`Error::ProcessLaunchFailed`] if the process dies or never
    ///   announces its endpoint within the launch timeout; the message
    ///   carries the stderr tail.
    pub async fn launch(self) -> Result<Browser> {
        let executable = self.resolve_executable()?;
        let profile = tempfile::tempdir()?;

        let args = launch_args(self.headless, profile.path(), &self.extra_args);
        debug!(executable = %executable.display(), "spawning chromium");
        let mut child = Command::new(&executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take().ok_or_else(|| {
            Error::process_launch_failed("stderr pipe unavailable")
        })?;

        let banner_url = match tokio::time::timeout(
            Duration::from_millis(self.launch_timeout_ms),
            scan_for_endpoint(stderr),
        )
        .await
        {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                kill_quietly(&mut child);
                return Err(e);
            }
            Err(_) => {
                kill_quietly(&mut child);
                return Err(Error::process_launch_failed(format!(
                    "no DevTools endpoint within {}ms",
                    self.launch_timeout_ms
                )));
            }
        };

        let ws_url = match resolve_browser_ws_url(&banner_url).await {
            Ok(url) => url,
            Err(e) => {
                kill_quietly(&mut child);
                return Err(e);
            }
        };

        let connection = match Connection::connect(&ws_url).await {
            Ok(connection) => connection,
            Err(e) => {
                kill_quietly(&mut child);
                return Err(e);
            }
        };

        let policy = self.policy();
        let browser = Browser::assemble(connection, Some(child), self.sink, policy);
        browser.register_cleanup(Box::new(move || {
            // Removes the temporary profile; held alive until close.
            drop(profile);
        }));
        debug!(endpoint = %ws_url, "chromium ready");
        Ok(browser)
    }

    fn resolve_executable(&self) -> Result<PathBuf> {
        let path = match &self.executable {
            Some(path) => path.clone(),
            None => std::env::var_os(EXECUTABLE_ENV)
                .map(PathBuf::from)
                .ok_or_else(|| Error::executable_not_found(format!("${EXECUTABLE_ENV}")))?,
        };
        if !path.is_file() {
            return Err(Error::executable_not_found(path));
        }
        Ok(path)
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("executable", &self.executable)
            .field("headless", &self.headless)
            .field("extra_args", &self.extra_args)
            .finish()
    }
}

// ============================================================================
// Launch Plumbing
// ============================================================================

fn launch_args(headless: bool, profile_dir: &Path, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "--remote-debugging-port=0".to_string(),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
    ];
    if cfg!(target_os = "linux") {
        args.push("--disable-crash-reporter".to_string());
        args.push("--disable-crashpad".to_string());
    }
    if headless {
        args.push("--headless=new".to_string());
    }
    args.extend(extra.iter().cloned());
    args
}

/// Extracts the endpoint URL from one stderr line, if present.
fn endpoint_from_line(line: &str) -> Option<String> {
    DEVTOOLS_BANNER
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

async fn scan_for_endpoint(stderr: tokio::process::ChildStderr) -> Result<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail: Vec<String> = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if let Some(url) = endpoint_from_line(&line) {
            return Ok(url);
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.remove(0);
        }
        tail.push(line);
    }

    Err(Error::process_launch_failed(format!(
        "process exited before announcing its endpoint: {}",
        tail.join(" | ")
    )))
}

#[derive(Deserialize)]
struct VersionMetadata {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Derives the `/json/version` URL from the stderr banner URL.
fn version_url(banner_url: &str) -> Result<String> {
    let parsed = url::Url::parse(banner_url)
        .map_err(|_| Error::invalid_url(banner_url))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::invalid_url(banner_url))?;
    let port = parsed.port().ok_or_else(|| Error::invalid_url(banner_url))?;
    Ok(format!("http://{host}:{port}/json/version"))
}

/// The stderr banner names a transient URL; the authoritative
/// browser-level endpoint comes from `/json/version`.
async fn resolve_browser_ws_url(banner_url: &str) -> Result<String> {
    let metadata: VersionMetadata = reqwest::get(version_url(banner_url)?)
        .await?
        .json()
        .await?;
    Ok(metadata.web_socket_debugger_url)
}

fn kill_quietly(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "process kill failed");
    }
}

// ============================================================================
// Tests
// ============================================================================
