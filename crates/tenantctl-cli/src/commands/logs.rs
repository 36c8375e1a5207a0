use std::io::Write;

use crate::cli::LogsListArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::models::{LogList, LogRecord};
use crate::output::{OutputFormat, Renderer};
use crate::pagination::{Page, fetch_all, validate_budget};

pub(crate) async fn handle_logs_list<W: Write>(
    ctx: &AppContext,
    args: LogsListArgs,
    renderer: &mut Renderer<W>,
) -> CliResult<()> {
    let budget = validate_budget(args.number)?;
    let endpoint = ctx.endpoint("logs")?;

    let records: Vec<LogRecord> = fetch_all(budget, |options| {
        let mut url = endpoint.clone();
        url.query_pairs_mut().extend_pairs(options.query_pairs());
        async move { ctx.get_json::<LogList>(url).await.map(Page::from) }
    })
    .await
    .map_err(|err| err.context("failed to list logs"))?;

    tracing::debug!(count = records.len(), "fetched log events");
    match ctx.output {
        OutputFormat::Table => renderer.render_logs(&records),
        OutputFormat::Json => {
            let body = serde_json::to_vec(&records).map_err(CliError::render)?;
            renderer.render_json(&body)
        }
    }
}
