//! Command handlers for CLI subcommands

mod auth;
mod completions;
mod config;
mod object;

pub use auth::handle_auth;
pub use completions::handle_completions;
pub use config::handle_config;
pub use object::handle_object;

use crate::error::Result;
use crate::output::OutputWriter;
use fxk_core::{Error as CoreError, HttpTransport, ProfileStore, Transport};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Transport configured from the active profile
pub(crate) fn build_transport(store: &ProfileStore) -> Result<Arc<dyn Transport>> {
    let config = store.load()?;
    let profile = config
        .active()
        .ok_or_else(|| CoreError::config("No current profile set"))?;

    let transport = HttpTransport::from_profile(profile, &config)?;
    debug!(
        profile = %profile.name,
        base_url = %transport.base_url(),
        "Built HTTP transport"
    );
    Ok(Arc::new(transport))
}

/// Await `future` behind a spinner when one can be shown
pub(crate) async fn with_spinner<F: Future>(output: &OutputWriter, message: &str, future: F) -> F::Output {
    let spinner = output.spinner(message);
    let result = future.await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    result
}
