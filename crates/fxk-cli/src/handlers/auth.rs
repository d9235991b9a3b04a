//! Auth command handlers

use super::{build_transport, with_spinner};
use crate::cli::{AuthAction, AuthArgs};
use crate::error::Result;
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use chrono::{DateTime, Local, Utc};
use fxk_core::auth::{logout, token_status};
use fxk_core::{Authenticator, ProfileStore, TokenStatus};
use serde_json::json;

/// Handle the auth command
pub async fn handle_auth(args: AuthArgs, store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        AuthAction::Login => handle_login(store, output).await,
        AuthAction::Status => handle_status(store, output),
        AuthAction::Logout => handle_logout(store, output),
    }
}

async fn handle_login(store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::new("auth_login");
    let auth = Authenticator::new(store.clone(), build_transport(store)?);

    let result = with_spinner(output, "Authenticating...", auth.authenticate()).await;
    output.normalized(&result)?;
    let session = result.into_result()?;

    let profile = store.load()?.active_profile;
    output.success(&format!(
        "Logged in to corp {} (profile '{}')",
        session.corp_id, profile
    ))?;
    if let Some(expires_at) = session.expires_at {
        output.info(&format!("Token expires {}", local_time(expires_at)))?;
    }
    Ok(())
}

fn handle_status(store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let status = token_status(store)?;

    if !output.is_human() {
        return output.data(&status);
    }

    match status {
        TokenStatus::Missing => output.warning("Not logged in. Run `fxk auth login` first."),
        TokenStatus::Valid {
            profile,
            corp_id,
            expires_at,
        } => {
            output.success(&format!(
                "Logged in to corp {} (profile '{}')",
                corp_id.as_deref().unwrap_or("-"),
                profile
            ))?;
            match expires_at {
                Some(at) => output.info(&format!("Token expires {}", local_time(at))),
                None => output.info("Token has no recorded expiry"),
            }
        }
        TokenStatus::Expired { profile, expired_at } => output.warning(&format!(
            "Token for profile '{}' expired {}. Run `fxk auth login` again.",
            profile,
            local_time(expired_at)
        )),
    }
}

fn handle_logout(store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let had_token = logout(store)?;

    if !output.is_human() {
        return output.data(&json!({ "loggedOut": had_token }));
    }
    if had_token {
        output.success("Logged out")
    } else {
        output.info("No stored token to remove")
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}
