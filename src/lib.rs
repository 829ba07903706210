pub mod analytics; // Blood-pressure series, symptom frequency
pub mod api; // Remote sharing API: traits, HTTP client, in-memory backend
pub mod config;
pub mod error;
pub mod export; // CSV + printable HTML report
pub mod filters;
pub mod gateway; // Shared-history fetch + shape normalization
pub mod links;
pub mod models;
pub mod pressure;
pub mod share_code;
pub mod table;
pub mod workflow; // Doctor/patient access requests


pub use error::{SharingError, SharingResult};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("{} v{} tracing initialised", config::APP_NAME, config::APP_VERSION);
}
