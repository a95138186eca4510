// Local crates
use crate::{
    buffer_batcher::batcher::send_events,
    cli::cli::{Cli, Commands, EventCommand, FieldCommand, QueryCommand, TargetCommand},
    event_stream::{fetch::fetch, sweep::sweep},
    helpers::load_config::{Config, EventOverrides},
    rpc::{client::RpcClient, service::EventService},
    runtime::{admin, errors::CommandError},
};

// External crates
use std::future::Future;
use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::instrument;

/// Client runtime: resolve configuration, connect the RPC client to stdin and
/// stdout, run the command.
pub async fn execute(cli: Cli) -> Result<(), CommandError> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    let endpoint = config.server_endpoint(cli.host, cli.port);
    let client = RpcClient::new(&endpoint);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    dispatch(&client, &config, cli.command, cli.utc, stdin, &mut stdout).await
}

/// Run a single command against `service`.
///
/// Event formatting options are resolved before the first remote call, so a
/// bad option never leaves a half-done command behind.
#[instrument(
    name = "norikra_client_runtime::dispatch",
    target = "runtime::runtime",
    skip_all,
    level = "debug"
)]
pub async fn dispatch<S, R, W>(
    service: &S,
    config: &Config,
    command: Commands,
    utc: bool,
    input: R,
    out: &mut W,
) -> Result<(), CommandError>
where
    S: EventService,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match command {
        Commands::Target { command } => match command {
            TargetCommand::List { simple } => admin::list_targets(service, simple, out).await,
            TargetCommand::Open { target, fields } => {
                admin::open_target(service, &target, &fields).await
            }
            TargetCommand::Close { target } => admin::close_target(service, &target).await,
        },

        Commands::Field { command } => match command {
            FieldCommand::List { target, simple } => {
                admin::list_fields(service, &target, simple, out).await
            }
            FieldCommand::Add {
                target,
                field,
                field_type,
            } => admin::reserve_field(service, &target, &field, &field_type).await,
        },

        Commands::Query { command } => match command {
            QueryCommand::List { simple } => admin::list_queries(service, simple, out).await,
            QueryCommand::Add {
                query_name,
                expression,
                group,
            } => admin::register_query(service, &query_name, group.as_deref(), &expression).await,
            QueryCommand::Remove { query_name } => {
                admin::deregister_query(service, &query_name).await
            }
        },

        Commands::Event { command } => match command {
            EventCommand::Send {
                target,
                format,
                batch_size,
            } => {
                let options = config.format_options(EventOverrides {
                    format,
                    batch_size,
                    utc,
                    ..Default::default()
                })?;
                send_events(service, input, &target, options.format, options.batch_size)
                    .await
                    .map(drop)
            }
            EventCommand::Fetch { query_name, output } => {
                let options = config.format_options(output.overrides(None, utc))?;
                fetch(service, &query_name, &options, out).await.map(drop)
            }
            EventCommand::Sweep {
                group,
                output,
                query_name_key,
            } => {
                let options = config.format_options(output.overrides(query_name_key, utc))?;
                sweep(service, group.as_deref(), &options, out)
                    .await
                    .map(drop)
            }
        },
    }
}

/// Error boundary around a whole command.
///
/// Client errors, server errors and local failures each get their own message
/// on stderr and a non-zero exit status, never a panic trace.
pub async fn wrap<F>(command: F) -> ExitCode
where
    F: Future<Output = Result<(), CommandError>>,
{
    match command.await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_broken_pipe() => {
            tracing::debug!("Output closed by reader, stopping");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            for line in e.report() {
                eprintln!("{line}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}
