//! Error handling utilities

use crate::document::DocumentError;
use crate::error::{ConfigError, FlowError};
use tracing::error;

/// Handle fatal errors and exit with appropriate status code
///
/// `FlowError`s print their user message and map to a category exit code.
/// With `verbose >= 1` the full error chain is printed as well.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {:#}", error);

    let exit_code = if let Some(flow_err) = error.downcast_ref::<FlowError>() {
        eprintln!("{}", flow_err.user_message());
        if verbose >= 1 {
            eprintln!("\nContext Chain:\n{}", flow_err.developer_message());
        }
        flow_err.exit_code()
    } else if let Some(config_err) = error.downcast_ref::<ConfigError>() {
        eprintln!("{}", config_err.user_message());
        config_err.exit_code()
    } else if let Some(doc_err) = error.downcast_ref::<DocumentError>() {
        eprintln!("{}", doc_err.user_message());
        doc_err.exit_code()
    } else {
        eprintln!("Error: {error}");
        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }
        exit_code_for(&error)
    };

    std::process::exit(exit_code)
}

/// Exit code for errors that are not a top-level `FlowError`
fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(flow_err) = cause.downcast_ref::<FlowError>() {
            return flow_err.exit_code();
        }
        if let Some(doc_err) = cause.downcast_ref::<DocumentError>() {
            return doc_err.exit_code();
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            return config_err.exit_code();
        }
    }
    1
}
