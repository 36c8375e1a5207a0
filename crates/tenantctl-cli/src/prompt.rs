//! Interactive terminal prompts.

use std::sync::Arc;

use anyhow::anyhow;
use dialoguer::{Input, MultiSelect};

use crate::client::{CliError, CliResult};
use crate::reconcile::SelectionOption;

/// Interactive surface used by the relationship flows.
pub(crate) trait Prompt: Send + Sync {
    /// Present `options` and return the chosen subset; may be empty.
    ///
    /// # Errors
    ///
    /// Returns a failure when the terminal cannot be driven.
    fn multi_select(
        &self,
        message: &str,
        options: &[SelectionOption],
    ) -> CliResult<Vec<SelectionOption>>;

    /// Ask for a single line of text.
    ///
    /// # Errors
    ///
    /// Returns a failure when the terminal cannot be driven.
    fn input(&self, message: &str) -> CliResult<String>;
}

/// Prompts rendered with `dialoguer` on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn multi_select(
        &self,
        message: &str,
        options: &[SelectionOption],
    ) -> CliResult<Vec<SelectionOption>> {
        let labels: Vec<String> = options.iter().map(ToString::to_string).collect();
        let picked = MultiSelect::new()
            .with_prompt(message)
            .items(&labels)
            .interact_opt()
            .map_err(|err| CliError::failure(anyhow!("failed to read selection: {err}")))?;

        Ok(picked
            .unwrap_or_default()
            .into_iter()
            .filter_map(|index| options.get(index).cloned())
            .collect())
    }

    fn input(&self, message: &str) -> CliResult<String> {
        Input::<String>::new()
            .with_prompt(message)
            .interact_text()
            .map_err(|err| CliError::failure(anyhow!("failed to read input: {err}")))
    }
}

/// Run a multi-select on the blocking pool so the runtime stays responsive.
pub(crate) async fn select_blocking(
    prompt: Arc<dyn Prompt>,
    message: String,
    options: Vec<SelectionOption>,
) -> CliResult<Vec<SelectionOption>> {
    tokio::task::spawn_blocking(move || prompt.multi_select(&message, &options))
        .await
        .map_err(|err| CliError::failure(anyhow!("prompt task failed: {err}")))?
}

/// Ask for a value on the blocking pool; blank answers are rejected.
pub(crate) async fn input_blocking(prompt: Arc<dyn Prompt>, message: String) -> CliResult<String> {
    let answer = tokio::task::spawn_blocking(move || prompt.input(&message))
        .await
        .map_err(|err| CliError::failure(anyhow!("prompt task failed: {err}")))??;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(CliError::validation("a value is required"));
    }
    Ok(answer.to_string())
}
