use norikra_client::cli::cli;
use norikra_client::instrumentation::tracing::{init_panic_handler, init_tracing};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let _guard = init_tracing()?;
    init_panic_handler();

    Ok(cli::run().await)
}
