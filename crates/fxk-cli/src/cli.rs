//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// fxk - command-line client for the FXiaoKe CRM open API
///
/// Stores app credentials in named profiles, exchanges them for an access
/// token and lists or fetches CRM objects.
#[derive(Parser, Debug)]
#[command(
    name = "fxk",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the profile store
    #[arg(short, long, global = true, env = "FXK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Fail on an unreadable profile store instead of falling back to defaults
    #[arg(long, global = true)]
    pub strict_config: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage profiles and their settings
    Config(ConfigArgs),

    /// Log in, check or drop the stored access token
    Auth(AuthArgs),

    /// List and fetch CRM objects
    Object(ObjectArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// List all profiles
    List,

    /// Show a profile's settings
    Show(ConfigShowArgs),

    /// Print a single profile value
    Get(ConfigGetArgs),

    /// Set a profile value
    Set(ConfigSetArgs),

    /// Remove a profile value
    Unset(ConfigGetArgs),

    /// Make a profile the active one
    Use(ProfileNameArgs),

    /// Create an empty profile
    Add(ProfileNameArgs),

    /// Delete a profile
    Remove(ProfileNameArgs),

    /// Print the location of the profile store
    Path,
}

#[derive(Parser, Debug)]
pub struct ConfigShowArgs {
    /// Profile to show (defaults to the active profile)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Render in the given format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: ConfigFormat,

    /// Print secrets and tokens instead of masking them
    #[arg(long)]
    pub show_secrets: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigGetArgs {
    /// Setting name, e.g. appId, baseUrl, timeout
    pub key: String,

    /// Profile to read from (defaults to the active profile)
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ConfigSetArgs {
    /// Setting name, e.g. appId, baseUrl, timeout
    pub key: String,

    #[arg(allow_hyphen_values = true)]
    pub value: String,

    /// Profile to modify (defaults to the active profile)
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ProfileNameArgs {
    pub name: String,
}

#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Exchange the active profile's app credentials for an access token
    Login,

    /// Show whether a usable token is stored
    Status,

    /// Forget the stored token
    Logout,
}

#[derive(Parser, Debug)]
pub struct ObjectArgs {
    #[command(subcommand)]
    pub action: ObjectAction,
}

#[derive(Subcommand, Debug)]
pub enum ObjectAction {
    /// List object descriptions
    List(ObjectListArgs),

    /// Fetch a single object
    Get(ObjectGetArgs),
}

#[derive(Parser, Debug)]
pub struct ObjectListArgs {
    /// Only list objects of this type
    #[arg(short = 't', long = "type")]
    pub object_type: Option<String>,

    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: u32,

    /// Page number, starting at 1
    #[arg(long = "page", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_number: u32,
}

#[derive(Parser, Debug)]
pub struct ObjectGetArgs {
    /// Object id
    pub id: String,

    /// Object type the id belongs to
    #[arg(short = 't', long = "type")]
    pub object_type: Option<String>,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Formats `config show` can render
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_object_list_defaults() {
        let cli = Cli::parse_from(["fxk", "object", "list"]);
        match cli.command {
            Commands::Object(ObjectArgs {
                action: ObjectAction::List(args),
            }) => {
                assert_eq!(args.page_size, 20);
                assert_eq!(args.page_number, 1);
                assert_eq!(args.object_type, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_page_size_must_be_positive() {
        assert!(Cli::try_parse_from(["fxk", "object", "list", "--page-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["fxk", "object", "list", "--page", "0"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["fxk", "auth", "status", "-o", "json-pretty", "--strict-config", "-vv"]);
        assert_eq!(cli.output, OutputFormat::JsonPretty);
        assert!(cli.strict_config);
        assert_eq!(cli.verbosity_level(), 2);
    }

    #[test]
    fn test_set_accepts_negative_values() {
        let cli = Cli::parse_from(["fxk", "config", "set", "timeout", "-5"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Set(args),
            }) => assert_eq!(args.value, "-5"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["fxk", "-q", "-v", "auth", "status"]).is_err());
        let cli = Cli::parse_from(["fxk", "-q", "auth", "status"]);
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_config_set_with_profile() {
        let cli = Cli::parse_from(["fxk", "config", "set", "appId", "FSAID_1", "--profile", "staging"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Set(args),
            }) => {
                assert_eq!(args.key, "appId");
                assert_eq!(args.value, "FSAID_1");
                assert_eq!(args.profile.as_deref(), Some("staging"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
