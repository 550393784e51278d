use tracing_subscriber::EnvFilter;

use crate::config::Mode;

/// Install the global subscriber. `RUST_LOG` wins over the mode default.
pub fn init(mode: Mode) {
    let default_filter = match mode {
        Mode::Development => "duocall=debug,tower_http=debug",
        Mode::Production => "duocall=info,tower_http=warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if mode.is_production() {
        builder.json().init();
    } else {
        builder.with_thread_ids(true).init();
    }
}
