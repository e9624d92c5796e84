//! aggplan: offline validation and planning of search aggregation requests.
//!
//! Exit codes:
//!   0 - success
//!   1 - unreadable input, bad config, or a construction or build failure
//!   2 - the request was parsed but failed validation or admission

mod cli;
mod report;

use aggplan_core::{
    admission::{AdmissionError, QUERY_GROUP_ID_HEADER, RequestHeaders, RequestRejectionListener},
    codec::encode_builder,
    config::Config,
    error::{Error as CoreError, ErrorClass},
    plan::AggregationRequest,
    tree::AggregationTreeBuilder,
};
use clap::Parser;
use cli::{Cli, Command};
use report::{DryRunContext, PlanReport, to_hex};
use std::{fs, path::Path, process::ExitCode};
use thiserror::Error as ThisError;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

///
/// CliError
///

#[derive(Debug, ThisError)]
enum CliError {
    #[error("cannot read [{path}]: {reason}")]
    Io { path: String, reason: String },

    #[error("cannot render the plan: {reason}")]
    Render { reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Core(err)
                if err.class().is_accumulated() || err.class() == ErrorClass::Admission =>
            {
                ExitCode::from(2)
            }
            _ => ExitCode::FAILURE,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(?cli, "parsed arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

// RUST_LOG wins over --verbose when both are given.
fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => Config::load(path).map_err(CoreError::from)?,
        None => Config::default(),
    };
    let registry = config.registry().map_err(CoreError::from)?;
    let parser = config.request_parser(&registry);

    let read = |file: &Path| -> Result<AggregationTreeBuilder, CliError> {
        let text = fs::read_to_string(file).map_err(|err| CliError::Io {
            path: file.display().to_string(),
            reason: err.to_string(),
        })?;

        Ok(parser
            .parse_body_str(&text)
            .map_err(CoreError::from)?
            .unwrap_or_default())
    };

    match &cli.command {
        Command::Validate { file } => {
            let builder = read(file)?;
            builder.check().map_err(CoreError::from)?;
            println!("ok: {} aggregations", builder.count());
        }

        Command::Plan {
            file,
            query_group,
            rejected_groups,
        } => {
            let request = AggregationRequest::new(read(file)?);
            let listener = RequestRejectionListener::new(|group_id: &str| {
                if rejected_groups.iter().any(|rejected| rejected == group_id) {
                    Err(AdmissionError::rejected(group_id, "group is over its limits"))
                } else {
                    Ok(())
                }
            });
            let mut headers = RequestHeaders::new();
            if let Some(group_id) = query_group {
                headers.insert(QUERY_GROUP_ID_HEADER, group_id.as_str());
            }

            let admitted = request.admit(&listener, &headers).map_err(CoreError::from)?;
            let plan = admitted.plan(&DryRunContext)?;
            let rendered =
                serde_json::to_string_pretty(&PlanReport::new(&plan)).map_err(|err| {
                    CliError::Render {
                        reason: err.to_string(),
                    }
                })?;
            println!("{rendered}");
        }

        Command::Encode { file } => {
            let bytes = encode_builder(&read(file)?).map_err(CoreError::from)?;
            println!("{}", to_hex(&bytes));
        }
    }

    Ok(())
}
