// Local crates
use crate::helpers::load_config::EventOverrides;
use crate::models::models::FieldDefinition;
use crate::parser::parser::Format;
use crate::runtime::runtime;

// External crates
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line arguments of `norikra-client`.
#[derive(Debug, Parser)]
#[command(
    name = "norikra-client",
    long_about = "Command line client for the Norikra stream processing server: manage targets, fields and queries, send events in and fetch query output events out.",
    about = "Norikra stream processing server client",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        norikra-client target open www path:string status:int
        norikra-client query add www_count 'SELECT count(*) AS cnt FROM www.win:time_batch(10 sec)'
        cat access.json | norikra-client event send www
        norikra-client event fetch www_count --time-format '%H:%M:%S'
        norikra-client event sweep --format ltsv"
)]
pub struct Cli {
    /// Norikra server host [default: localhost]
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Norikra server port [default: 26571]
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Client configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Render event times in UTC instead of the local time zone
    #[arg(long, global = true)]
    pub utc: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage targets
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },

    /// Manage target field/datatype definitions
    Field {
        #[command(subcommand)]
        command: FieldCommand,
    },

    /// Manage queries
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },

    /// Send/fetch events
    Event {
        #[command(subcommand)]
        command: EventCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TargetCommand {
    /// Show list of targets
    List {
        /// Suppress header/footer
        #[arg(short, long)]
        simple: bool,
    },

    /// Create new target (and define its fields)
    Open {
        target: String,
        /// Field definitions as NAME:TYPE
        #[arg(value_name = "NAME:TYPE")]
        fields: Vec<FieldDefinition>,
    },

    /// Close existing target and all its queries
    Close { target: String },
}

#[derive(Debug, Subcommand)]
pub enum FieldCommand {
    /// Show list of field definitions of specified target
    List {
        target: String,
        /// Suppress header/footer
        #[arg(short, long)]
        simple: bool,
    },

    /// Reserve fieldname and its type of target
    Add {
        target: String,
        field: String,
        #[arg(value_name = "TYPE")]
        field_type: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Show list of queries
    List {
        /// Suppress header/footer
        #[arg(short, long)]
        simple: bool,
    },

    /// Register a query
    Add {
        query_name: String,
        expression: String,
        /// Query group for sweep (default: none)
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Deregister a query
    Remove { query_name: String },
}

#[derive(Debug, Subcommand)]
pub enum EventCommand {
    /// Send data into targets, one event per line of stdin
    Send {
        target: String,

        /// Format of input data per line of stdin [default: json]
        #[arg(long, value_enum)]
        format: Option<Format>,

        /// Records sent in one transfer [default: 10000]
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        batch_size: Option<usize>,
    },

    /// Fetch events from specified query
    Fetch {
        query_name: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Fetch all output events of all queries of default (or specified) query group
    Sweep {
        #[arg(value_name = "QUERY_GROUP")]
        group: Option<String>,

        #[command(flatten)]
        output: OutputArgs,

        /// Output key name for query name [default: query]
        #[arg(long)]
        query_name_key: Option<String>,
    },
}

/// Output options shared by `event fetch` and `event sweep`.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Format of output data per line of stdout [default: json]
    #[arg(long, value_enum)]
    pub format: Option<Format>,

    /// Output key name for event time [default: time]
    #[arg(long)]
    pub time_key: Option<String>,

    /// Output time format [default: '%Y/%m/%d %H:%M:%S']
    #[arg(long)]
    pub time_format: Option<String>,
}

impl OutputArgs {
    /// Event options of these flags, for option resolution.
    pub fn overrides(self, query_name_key: Option<String>, utc: bool) -> EventOverrides {
        EventOverrides {
            format: self.format,
            batch_size: None,
            time_key: self.time_key,
            time_format: self.time_format,
            query_name_key,
            utc,
        }
    }
}

/// Entry function for CLI
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    runtime::wrap(runtime::execute(cli)).await
}
