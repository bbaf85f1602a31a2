//! CLI argument definitions using clap.
//!
//! Every preview option also reads an `INPUT_<NAME>` environment variable,
//! which is how GitHub Actions passes step inputs to the binary. Actions sets
//! unset inputs to the empty string, so empty values count as absent.

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// sqlpreview - preview schema migrations on pull requests
#[derive(Parser, Debug)]
#[command(name = "sqlpreview")]
#[command(version)]
#[command(about = "sqlpreview - preview schema migrations on pull requests", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute the DDL for a schema file and publish it as a review comment
    Preview(Box<PreviewArgs>),

    /// Display version information
    Version,
}

/// Arguments for the `preview` command
#[derive(Args, Debug, Default)]
pub struct PreviewArgs {
    // =========================================================================
    // Engine
    // =========================================================================
    /// Database kind (mysql, postgresql, sqlite, mssql)
    #[arg(short, long, env = "INPUT_KIND")]
    pub kind: Option<String>,

    /// Engine release to download ("latest" or a tag such as v0.17.0)
    #[arg(long = "engine-version", env = "INPUT_VERSION")]
    pub engine_version: Option<String>,

    /// Engine configuration file, passed through as --config
    #[arg(long = "engine-config", env = "INPUT_CONFIG")]
    pub engine_config: Option<PathBuf>,

    /// Release download root, for mirrors
    #[arg(long, env = "SQLPREVIEW_RELEASE_BASE_URL")]
    pub release_base_url: Option<String>,

    /// Apply the schema instead of only planning it
    #[arg(long, env = "INPUT_APPLY", value_parser = FalseyValueParser::new())]
    pub apply: bool,

    // =========================================================================
    // Schema
    // =========================================================================
    /// Desired schema file
    #[arg(short, long, env = "INPUT_SCHEMA_FILE")]
    pub schema_file: Option<PathBuf>,

    /// Baseline schema file, used instead of the base revision
    #[arg(long, env = "INPUT_BASELINE_FILE")]
    pub baseline_file: Option<PathBuf>,

    /// Repository checkout used to read the base revision
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    pub repo_dir: PathBuf,

    // =========================================================================
    // Connection
    // =========================================================================
    /// Database host
    #[arg(long, env = "INPUT_HOST")]
    pub host: Option<String>,

    /// Database port
    #[arg(long, env = "INPUT_PORT")]
    pub port: Option<String>,

    /// Database user
    #[arg(short, long, env = "INPUT_USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "INPUT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database name, or database file for sqlite
    #[arg(short, long, env = "INPUT_DATABASE")]
    pub database: Option<String>,

    // =========================================================================
    // Comment
    // =========================================================================
    /// Token used to post the review comment
    #[arg(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Comment title; also keys the comment when set
    #[arg(long, env = "INPUT_TITLE")]
    pub title: Option<String>,

    /// Login whose comments may be updated (empty matches anyone)
    #[arg(long, env = "INPUT_COMMENT_AUTHOR")]
    pub comment_author: Option<String>,

    /// Never post a comment
    #[arg(long, env = "INPUT_SKIP_COMMENT", value_parser = FalseyValueParser::new())]
    pub no_comment: bool,

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Path to sqlpreview.toml
    #[arg(long, env = "SQLPREVIEW_CONFIG")]
    pub config_file: Option<PathBuf>,
}
