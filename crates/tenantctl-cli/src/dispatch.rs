//! Authenticated request execution wrapped in a scoped busy indicator.
//!
//! # Design
//! - Every network call runs inside [`waiting`], which holds a [`BusyGuard`]
//!   for the lifetime of the call and races it against [`Cancellation`].
//! - [`AppContext::send`] passes any status through untouched; the typed
//!   helpers used by the relationship flows classify failures instead.

use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::client::{AppContext, Cancellation, CliError, CliResult, classify_problem};
use crate::request::RequestDescriptor;

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const SPINNER_TICK: Duration = Duration::from_millis(120);

/// User agent sent with every request.
#[must_use]
pub(crate) fn user_agent() -> String {
    format!("tenantctl/{}", env!("CARGO_PKG_VERSION"))
}

/// UI state shown while a blocking call is in flight.
pub(crate) trait BusyIndicator: Send + Sync {
    /// Show the indicator with a short label.
    fn enter(&self, label: &str);
    /// Hide the indicator.
    fn exit(&self);
}

/// Keeps a [`BusyIndicator`] active until dropped.
pub(crate) struct BusyGuard<'a> {
    indicator: &'a dyn BusyIndicator,
}

impl<'a> BusyGuard<'a> {
    /// Enter `indicator`; it is exited when the guard drops.
    pub(crate) fn enter(indicator: &'a dyn BusyIndicator, label: &str) -> Self {
        indicator.enter(label);
        Self { indicator }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.indicator.exit();
    }
}

/// Animated stderr spinner; silent when stderr is not a terminal.
pub(crate) struct Spinner {
    enabled: bool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Spinner {
    /// Spinner bound to the process stderr.
    #[must_use]
    pub(crate) fn for_stderr() -> Self {
        Self {
            enabled: io::stderr().is_terminal(),
            ticker: Mutex::new(None),
        }
    }
}

impl BusyIndicator for Spinner {
    fn enter(&self, label: &str) {
        if !self.enabled {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let label = label.to_string();
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(SPINNER_TICK);
            for frame in SPINNER_FRAMES.iter().cycle() {
                interval.tick().await;
                draw(&format!("\r{frame} {label}"));
            }
        });
        match self.ticker.lock() {
            Ok(mut slot) => {
                if let Some(previous) = slot.replace(handle) {
                    previous.abort();
                }
            }
            Err(_) => handle.abort(),
        }
    }

    fn exit(&self) {
        let handle = self.ticker.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.abort();
            draw("\r\x1b[2K");
        }
    }
}

fn draw(text: &str) {
    let mut stderr = io::stderr().lock();
    let _ = stderr.write_all(text.as_bytes());
    let _ = stderr.flush();
}

/// Run `operation` while `indicator` is active, aborting on cancellation.
///
/// # Errors
///
/// Returns the operation's error, or [`CliError::Cancelled`] when
/// `cancellation` fires first.
pub(crate) async fn waiting<T, F>(
    indicator: &dyn BusyIndicator,
    cancellation: &Cancellation,
    label: &str,
    operation: F,
) -> CliResult<T>
where
    F: Future<Output = CliResult<T>>,
{
    let _busy = BusyGuard::enter(indicator, label);
    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(CliError::Cancelled),
        result = operation => result,
    }
}

/// Raw response returned by the generic dispatcher.
#[derive(Debug, Clone)]
pub(crate) struct ApiResponse {
    /// HTTP status as returned by the server.
    pub(crate) status: StatusCode,
    /// Full response body.
    pub(crate) body: Vec<u8>,
}

impl AppContext {
    /// Execute a built request with bearer authentication.
    ///
    /// Non-success statuses are returned as-is for the caller to render.
    pub(crate) async fn send(&self, request: &RequestDescriptor) -> CliResult<ApiResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
        let (status, body) = self
            .execute(request.method.into(), request.url.clone(), request.body.clone())
            .await
            .map_err(|err| err.context("failed to send request"))?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "received response");
        Ok(ApiResponse { status, body })
    }

    /// GET a JSON document, treating non-success statuses as errors.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> CliResult<T> {
        let (status, body) = self.execute(Method::GET, url, Vec::new()).await?;
        if !status.is_success() {
            return Err(classify_problem(status, &body));
        }
        serde_json::from_slice(&body)
            .map_err(|err| CliError::failure(anyhow!("failed to parse response body: {err}")))
    }

    /// Send a JSON payload, treating non-success statuses as errors.
    pub(crate) async fn send_json<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        payload: &B,
    ) -> CliResult<()> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| CliError::failure(anyhow!("failed to encode request body: {err}")))?;
        let (status, body) = self.execute(method, url, body).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(classify_problem(status, &body))
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
    ) -> CliResult<(StatusCode, Vec<u8>)> {
        let token = self.credentials.credential_for(&self.tenant)?;
        let label = format!("{method} {}", url.path());

        waiting(self.busy.as_ref(), &self.cancellation, &label, async {
            let response = self
                .client
                .request(method, url)
                .bearer_auth(token)
                .header(CONTENT_TYPE, "application/json")
                .header(USER_AGENT, user_agent())
                .body(body)
                .send()
                .await
                .map_err(|err| CliError::failure(anyhow!(err)))?;
            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|err| CliError::failure(anyhow!("failed to read response body: {err}")))?;
            Ok::<_, CliError>((status, bytes.to_vec()))
        })
        .await
    }
}
