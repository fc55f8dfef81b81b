//! Fatal error reporting

use crate::error::{describe_error_code, DistSortError};
use tracing::error;

/// Report a fatal error and exit with the matching status code.
///
/// Library errors carry their own exit code; anything else exits with 1.
/// With `verbose >= 1` the full cause chain is printed as well.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);
    eprintln!("Error: {error}");

    let exit_code = match error.downcast_ref::<DistSortError>() {
        Some(err) => {
            if verbose >= 1 {
                eprintln!("  ({})", describe_error_code(err.code()));
            }
            err.exit_code()
        }
        None => 1,
    };

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code)
}
