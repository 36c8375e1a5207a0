//! Shared client context, error types, and credential plumbing for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::watch;

use crate::cli::Cli;
use crate::dispatch::{BusyIndicator, Spinner};
use crate::output::OutputFormat;
use crate::prompt::{Prompt, TerminalPrompt};
use crate::request::api_root;

/// CLI-level error type separating user input problems, user aborts,
/// remote failures, and rendering failures.
#[derive(Debug)]
pub(crate) enum CliError {
    /// Bad input detected before (or rejected by) the server.
    Validation(String),
    /// The operator declined to pick anything in an interactive prompt.
    Aborted(String),
    /// Transport or remote failure.
    Failure(anyhow::Error),
    /// The request succeeded but the body could not be rendered.
    Render(anyhow::Error),
    /// The in-flight request was cancelled by the operator.
    Cancelled,
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) fn render(error: impl Into<anyhow::Error>) -> Self {
        Self::Render(error.into())
    }

    /// Process exit code reported for this error.
    #[must_use]
    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Aborted(_) => 1,
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::Render(_) => 4,
            Self::Cancelled => 130,
        }
    }

    /// Single human-readable line shown to the operator.
    #[must_use]
    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Aborted(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
            Self::Render(error) => format!("failed to prepare json output: {error:#}"),
            Self::Cancelled => "request cancelled".to_string(),
        }
    }

    /// Prefix the message with the operation that failed, keeping the variant.
    #[must_use]
    pub(crate) fn context(self, context: impl Display) -> Self {
        match self {
            Self::Validation(message) => Self::Validation(format!("{context}: {message}")),
            Self::Aborted(message) => Self::Aborted(message),
            Self::Failure(error) => Self::Failure(error.context(context.to_string())),
            Self::Render(error) => Self::Render(error.context(context.to_string())),
            Self::Cancelled => Self::Cancelled,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

/// Supplies a bearer credential for the active tenant.
pub(crate) trait CredentialSource: Send + Sync {
    /// Returns the access token to send for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no credential is available.
    fn credential_for(&self, tenant: &str) -> CliResult<String>;
}

/// Credential supplied directly through flags or the environment.
#[derive(Debug, Clone)]
pub(crate) struct StaticCredential {
    token: Option<String>,
}

impl StaticCredential {
    /// Wrap an optional token; blank values count as missing.
    #[must_use]
    pub(crate) fn new(token: Option<String>) -> Self {
        let token = token
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self { token }
    }
}

impl CredentialSource for StaticCredential {
    fn credential_for(&self, tenant: &str) -> CliResult<String> {
        self.token.clone().ok_or_else(|| {
            CliError::validation(format!(
                "no access token for tenant {tenant} (pass --token or set TENANTCTL_ACCESS_TOKEN)"
            ))
        })
    }
}

/// Cancellation handle threaded through every network call.
#[derive(Debug, Clone)]
pub(crate) struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    /// Create a handle that is not yet cancelled.
    #[must_use]
    pub(crate) fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Signal cancellation to every clone of this handle.
    pub(crate) fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Resolves once cancellation has been requested.
    pub(crate) async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Cancel this handle when the process receives Ctrl-C.
    pub(crate) fn cancel_on_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received, cancelling in-flight request");
                handle.cancel();
            }
        });
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) tenant: String,
    pub(crate) api_root: Url,
    pub(crate) credentials: Arc<dyn CredentialSource>,
    pub(crate) busy: Arc<dyn BusyIndicator>,
    pub(crate) prompt: Arc<dyn Prompt>,
    pub(crate) cancellation: Cancellation,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Construct the context from parsed flags.
    pub(crate) fn from_cli(cli: &Cli) -> CliResult<Self> {
        let tenant = cli
            .tenant
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                CliError::validation("tenant domain is required (pass --tenant or set TENANTCTL_TENANT)")
            })?
            .to_string();
        let api_root = api_root(&tenant)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(cli.timeout))
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        let cancellation = Cancellation::new();
        cancellation.cancel_on_ctrl_c();

        Ok(Self {
            client,
            tenant,
            api_root,
            credentials: Arc::new(StaticCredential::new(cli.token.clone())),
            busy: Arc::new(Spinner::for_stderr()),
            prompt: Arc::new(TerminalPrompt),
            cancellation,
            output: cli.output,
        })
    }

    /// Resolve a path relative to the management API root.
    pub(crate) fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.api_root
            .join(path.trim_start_matches('/'))
            .map_err(|err| CliError::validation(format!("invalid uri given: {err}")))
    }
}

/// Error body returned by the management API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProblemBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

/// Classify a non-success status and body into a CLI error.
pub(crate) fn classify_problem(status: StatusCode, body: &[u8]) -> CliError {
    let body_text = String::from_utf8_lossy(body).trim().to_string();
    let problem = serde_json::from_slice::<ProblemBody>(body).ok();

    let message = problem
        .as_ref()
        .and_then(|p| p.message.clone())
        .or_else(|| problem.as_ref().and_then(|p| p.error.clone()))
        .unwrap_or_else(|| body_text.clone());
    let code = problem.and_then(|p| p.error_code);

    let detail = match (message.is_empty(), code) {
        (true, _) => format!("request failed with status {status}"),
        (false, Some(code)) => format!("{message} ({code}, status {status})"),
        (false, None) => format!("{message} (status {status})"),
    };

    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        CliError::validation(detail)
    } else {
        CliError::failure(anyhow!(detail))
    }
}
