//! tracing-subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::{GlobalArgs, LogFormat};

/// Default filter directive for the chosen verbosity.
fn default_directive(args: &GlobalArgs) -> &'static str {
    if args.debug {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity
/// flags. Logs go to stderr.
pub fn init(args: &GlobalArgs) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive(args))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match args.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!(e))
}
