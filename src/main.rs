use colored::Colorize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use cwl_lite::cli::CommandLineInterface;
use cwl_lite::error::{ConversionError, LoadError};

fn init_tracing(verbose: bool) {
    let default = if verbose { "cwl_lite=debug" } else { "cwl_lite=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false);
    if tracing_subscriber::registry().with(fmt_layer.with_filter(filter)).try_init().is_err() {
        eprintln!("warning: tracing subscriber already initialized");
    }
}

/// The normalized tree behind a contract violation, if that is what failed.
fn conversion_payload(err: &anyhow::Error) -> Option<&ConversionError> {
    match err.downcast_ref::<LoadError>() {
        Some(LoadError::Conversion(c)) => Some(c),
        _ => err.downcast_ref::<ConversionError>(),
    }
}

fn main() {
    let command_line_interface = CommandLineInterface::load();
    init_tracing(command_line_interface.verbose);
    if let Err(error) = command_line_interface.run() {
        if let Some(conversion) = conversion_payload(&error) {
            eprintln!("{}", "In document:".yellow());
            eprintln!("{}", conversion.payload.to_pretty_json());
        }
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
