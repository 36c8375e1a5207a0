use std::io::Write;

use crate::cli::ApiArgs;
use crate::client::{AppContext, CliResult};
use crate::output::Renderer;
use crate::request::ApiRequestInputs;

pub(crate) async fn handle_api<W: Write>(
    ctx: &AppContext,
    args: ApiArgs,
    renderer: &mut Renderer<W>,
) -> CliResult<()> {
    let request = ApiRequestInputs::from_args(
        args.args,
        args.data,
        args.query.into_iter().collect(),
        &ctx.api_root,
    )?;
    let response = ctx.send(&request).await?;

    if !response.status.is_success() {
        tracing::warn!(
            status = response.status.as_u16(),
            url = %request.url,
            "management API returned an error status"
        );
    }
    renderer.render_json(&response.body)
}
