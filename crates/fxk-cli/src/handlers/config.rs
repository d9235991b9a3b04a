//! Configuration command handlers

use crate::cli::{ConfigAction, ConfigArgs, ConfigFormat, ConfigGetArgs, ConfigSetArgs, ConfigShowArgs};
use crate::error::{ErrorContext, Result};
use crate::logging::redaction;
use crate::output::OutputWriter;
use fxk_core::{Error as CoreError, ProfileStore};
use serde_json::json;
use tracing::info;

/// Handle the config command
pub fn handle_config(args: ConfigArgs, store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        ConfigAction::List => handle_config_list(store, output),
        ConfigAction::Show(show_args) => handle_config_show(show_args, store, output),
        ConfigAction::Get(get_args) => handle_config_get(get_args, store, output),
        ConfigAction::Set(set_args) => handle_config_set(set_args, store, output),
        ConfigAction::Unset(unset_args) => handle_config_unset(unset_args, store, output),
        ConfigAction::Use(args) => {
            store.set_active_profile(&args.name)?;
            info!(profile = %args.name, "Switched active profile");
            report(output, &format!("Switched to profile '{}'", args.name), &args.name, None)
        }
        ConfigAction::Add(args) => {
            store.add_profile(&args.name)?;
            report(output, &format!("Created profile '{}'", args.name), &args.name, None)?;
            output.info(&format!(
                "Add credentials with `fxk config set appId <value> --profile {}`",
                args.name
            ))
        }
        ConfigAction::Remove(args) => {
            store.remove_profile(&args.name)?;
            report(output, &format!("Removed profile '{}'", args.name), &args.name, None)
        }
        ConfigAction::Path => {
            let path = store.path().display().to_string();
            if output.is_human() {
                output.writeln(&path)
            } else {
                output.data(&json!({ "path": path }))
            }
        }
    }
}

/// Explicit profile name, or the active one
fn target_profile(store: &ProfileStore, requested: Option<String>) -> Result<String> {
    match requested {
        Some(name) => Ok(name),
        None => Ok(store.load()?.active_profile),
    }
}

fn report(output: &mut OutputWriter, message: &str, profile: &str, key: Option<&str>) -> Result<()> {
    if output.is_human() {
        output.success(message)
    } else {
        output.data(&json!({ "profile": profile, "key": key, "message": message }))
    }
}

fn handle_config_list(store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let profiles = store.list_profiles()?;

    if !output.is_human() {
        let listing: Vec<_> = profiles
            .iter()
            .map(|(profile, active)| {
                json!({
                    "name": profile.name,
                    "active": active,
                    "corpId": profile.corp_id,
                    "baseUrl": profile.base_url,
                    "loggedIn": profile.access_token.is_some(),
                })
            })
            .collect();
        return output.data(&listing);
    }

    let rows = profiles
        .iter()
        .map(|(profile, active)| {
            vec![
                if *active { "*".to_string() } else { String::new() },
                profile.name.clone(),
                profile.corp_id.clone().unwrap_or_else(|| "-".into()),
                profile.base_url.clone().unwrap_or_else(|| "(default)".into()),
                if profile.access_token.is_some() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    output.table(&["", "Profile", "Corp ID", "Base URL", "Logged in"], rows)
}

fn handle_config_show(args: ConfigShowArgs, store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let config = store.load()?;
    let name = args.profile.unwrap_or_else(|| config.active_profile.clone());
    let profile = config
        .profile(&name)
        .ok_or_else(|| CoreError::config(format!("Profile '{}' not found", name)))?;

    let mut value = serde_json::to_value(profile)?;
    if !args.show_secrets {
        redaction::redact_json_value(&mut value);
    }

    let rendered = match args.format {
        ConfigFormat::Json => serde_json::to_string_pretty(&value)?,
        ConfigFormat::Toml => toml::to_string_pretty(&value)
            .with_context(|| format!("Failed to render profile '{}' as TOML", name))?,
        ConfigFormat::Yaml => serde_yaml::to_string(&value)?,
    };
    output.writeln(rendered.trim_end())
}

fn handle_config_get(args: ConfigGetArgs, store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let name = target_profile(store, args.profile)?;
    let value = store.get_profile_value(&name, &args.key)?.ok_or_else(|| {
        CoreError::config(format!("'{}' is not set on profile '{}'", args.key, name))
    })?;

    if output.is_human() {
        output.writeln(&value)
    } else {
        output.data(&json!({ "profile": name, "key": args.key, "value": value }))
    }
}

fn handle_config_set(args: ConfigSetArgs, store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let name = target_profile(store, args.profile)?;
    store.set_profile_value(&name, &args.key, &args.value)?;

    info!(
        profile = %name,
        key = %args.key,
        secret = redaction::is_sensitive_key(&args.key),
        "Profile value updated"
    );
    report(output, &format!("Set {} on profile '{}'", args.key, name), &name, Some(&args.key))
}

fn handle_config_unset(args: ConfigGetArgs, store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let name = target_profile(store, args.profile)?;
    if store.unset_profile_value(&name, &args.key)? {
        report(output, &format!("Unset {} on profile '{}'", args.key, name), &name, Some(&args.key))
    } else {
        output.warning(&format!("'{}' was not set on profile '{}'", args.key, name))
    }
}
