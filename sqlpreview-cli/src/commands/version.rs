//! `sqlpreview version` command - Display version information.

use sqlpreview_engine::{DEFAULT_RELEASE_BASE_URL, DatabaseKind};

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
const NAME: &str = env!("CARGO_PKG_NAME");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header("sqlpreview");

    kv("Version", VERSION);
    kv("Binary", NAME);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    output::newline();

    output::section("Engines");
    for kind in DatabaseKind::ALL {
        kv(kind.as_str(), kind.profile().binary);
    }

    output::newline();
    output::dim(DEFAULT_RELEASE_BASE_URL);

    Ok(())
}
