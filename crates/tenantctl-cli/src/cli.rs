//! Command-line surface and top-level dispatch.

use std::env;
use std::io::{self, IsTerminal, Write};

use clap::{Args, Parser, Subcommand};

use crate::client::{AppContext, CliResult};
use crate::commands::api::handle_api;
use crate::commands::logs::handle_logs_list;
use crate::commands::roles::{handle_roles_assign, handle_roles_remove, handle_roles_show};
use crate::logging::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use crate::output::{OutputFormat, Renderer};
use crate::pagination::DEFAULT_ITEMS;
use crate::request::parse_query_pair;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Parses CLI arguments, executes the requested command, and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }

    let color = color_enabled(cli.no_color);
    colored::control::set_override(color);
    let mut renderer = Renderer::stdout(color);

    let result = match AppContext::from_cli(&cli) {
        Ok(ctx) => dispatch(&ctx, cli.command, &mut renderer).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            tracing::debug!(exit_code = err.exit_code(), "command failed");
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch<W: Write>(
    ctx: &AppContext,
    command: Command,
    renderer: &mut Renderer<W>,
) -> CliResult<()> {
    tracing::debug!(command = command_label(&command), tenant = %ctx.tenant, "running command");
    match command {
        Command::Api(args) => handle_api(ctx, args, renderer).await,
        Command::Users(UsersCommand::Roles(roles)) => match roles {
            RolesCommand::Show(args) => handle_roles_show(ctx, args, renderer).await,
            RolesCommand::Assign(args) => handle_roles_assign(ctx, args, renderer).await,
            RolesCommand::Remove(args) => handle_roles_remove(ctx, args, renderer).await,
        },
        Command::Logs(LogsCommand::List(args)) => handle_logs_list(ctx, args, renderer).await,
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Api(_) => "api",
        Command::Users(UsersCommand::Roles(RolesCommand::Show(_))) => "users roles show",
        Command::Users(UsersCommand::Roles(RolesCommand::Assign(_))) => "users roles assign",
        Command::Users(UsersCommand::Roles(RolesCommand::Remove(_))) => "users roles remove",
        Command::Logs(LogsCommand::List(_)) => "logs list",
    }
}

fn color_enabled(no_color: bool) -> bool {
    !no_color
        && env::var_os("NO_COLOR").is_none_or(|value| value.is_empty())
        && io::stdout().is_terminal()
}

#[derive(Parser)]
#[command(
    name = "tenantctl",
    version,
    about = "Administrative CLI for an identity tenant's management API"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "TENANTCTL_TENANT",
        help = "Tenant domain, e.g. acme.eu.example.com"
    )]
    pub(crate) tenant: Option<String>,
    #[arg(
        long,
        global = true,
        env = "TENANTCTL_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Management API access token"
    )]
    pub(crate) token: Option<String>,
    #[arg(
        long,
        global = true,
        env = "TENANTCTL_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(long, global = true, help = "Disable colored output (NO_COLOR is honoured too)")]
    pub(crate) no_color: bool,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "TENANTCTL_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Diagnostic log level; RUST_LOG takes precedence"
    )]
    pub(crate) log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub(crate) log_format: LogFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Send an authenticated request to any management API endpoint.
    Api(ApiArgs),
    /// Manage users.
    #[command(subcommand)]
    Users(UsersCommand),
    /// Inspect tenant logs.
    #[command(subcommand)]
    Logs(LogsCommand),
}

#[derive(Subcommand)]
pub(crate) enum UsersCommand {
    /// Manage a user's assigned roles.
    #[command(subcommand)]
    Roles(RolesCommand),
}

#[derive(Subcommand)]
pub(crate) enum RolesCommand {
    /// Show a user's roles.
    Show(RolesShowArgs),
    /// Assign roles to a user.
    #[command(visible_alias = "add")]
    Assign(RolesChangeArgs),
    /// Remove roles from a user.
    #[command(visible_alias = "rm")]
    Remove(RolesChangeArgs),
}

#[derive(Subcommand)]
pub(crate) enum LogsCommand {
    /// List recent log events.
    List(LogsListArgs),
}

#[derive(Args)]
pub(crate) struct ApiArgs {
    #[arg(
        value_name = "ARGS",
        required = true,
        num_args = 1..=2,
        help = "[method] <path>; the method defaults to GET, or POST when --data is set"
    )]
    pub(crate) args: Vec<String>,
    #[arg(short = 'd', long, default_value = "", help = "JSON request body")]
    pub(crate) data: String,
    #[arg(
        short = 'q',
        long = "query",
        value_name = "KEY=VALUE",
        value_parser = parse_query_pair,
        help = "Query parameter; may be repeated"
    )]
    pub(crate) query: Vec<(String, String)>,
}

#[derive(Args)]
pub(crate) struct RolesShowArgs {
    #[arg(help = "User identifier; prompted for when omitted")]
    pub(crate) user_id: Option<String>,
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_ITEMS,
        help = "Number of user roles to retrieve. Minimum 1, maximum 1000."
    )]
    pub(crate) number: usize,
}

#[derive(Args)]
pub(crate) struct RolesChangeArgs {
    #[arg(help = "User identifier; prompted for when omitted")]
    pub(crate) user_id: Option<String>,
    #[arg(
        short = 'r',
        long,
        value_delimiter = ',',
        help = "Role identifiers; skips the interactive picker"
    )]
    pub(crate) roles: Vec<String>,
}

#[derive(Args)]
pub(crate) struct LogsListArgs {
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_ITEMS,
        help = "Number of log entries to retrieve. Minimum 1, maximum 1000."
    )]
    pub(crate) number: usize,
}
