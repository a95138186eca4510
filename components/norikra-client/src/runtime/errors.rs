// Local crates
use crate::helpers::load_config::ConfigError;
use crate::helpers::time_format::TimeFormatError;
use crate::parser::parser::CodecError;
use crate::rpc::service::RpcError;

// External crates
use std::io;

/// Every way a single command can fail.
///
/// All variants are terminal, the command stops at the first one and the
/// dispatch boundary turns it into one message and a non-zero exit status.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("failed to parse input line {line}: {source}")]
    Decode { line: usize, source: CodecError },
    #[error(transparent)]
    Encode(#[from] CodecError),
    #[error(transparent)]
    Time(#[from] TimeFormatError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CommandError {
    /// Human readable report printed to stderr, one line per entry.
    pub fn report(&self) -> Vec<String> {
        match self {
            CommandError::Rpc(RpcError::Client(message)) => vec![format!("Failed: {message}")],
            CommandError::Rpc(RpcError::Server(message)) => vec![
                format!("ERROR on norikra server: {message}"),
                " For more details, see norikra server's logs".to_string(),
            ],
            CommandError::Rpc(other) => {
                vec![format!("ERROR: cannot reach norikra server: {other}")]
            }
            CommandError::Decode { line, source } => {
                vec![format!("Failed to parse input line {line}: {source}")]
            }
            CommandError::Encode(e) => vec![format!("Failed to encode output event: {e}")],
            CommandError::Time(e) => vec![format!("Failed to render event time: {e}")],
            CommandError::Config(e) => vec![format!("Invalid configuration: {e}")],
            CommandError::Io(e) => vec![format!("I/O error: {e}")],
        }
    }

    /// Configuration problems exit with 2 like command line usage errors,
    /// everything else with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            CommandError::Config(_) => 2,
            _ => 1,
        }
    }

    /// Downstream closed stdout (`| head`), nothing left worth reporting.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, CommandError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}
