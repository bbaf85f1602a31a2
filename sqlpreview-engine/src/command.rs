//! Engine command-line construction.
//!
//! Builds the argument vector and environment overlay for one engine
//! invocation from a database kind and a flat set of connection parameters.
//! The produced layout is:
//!
//! ```text
//! [host] [port] [user] [password (argv engines only)] [--dry-run] [--config <path>] --file <schema> <database>
//! ```
//!
//! The `--file` value and the `--dry-run` flag are tracked by index, so the
//! baseline variant is derived from the current invocation by substituting
//! the file and dropping the flag.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{PreviewError, PreviewResult};
use crate::kind::DatabaseKind;
use crate::secret::SecretMasker;

/// Flag preceding the schema file path.
pub const FILE_FLAG: &str = "--file";

/// Flag preceding the engine configuration file.
pub const CONFIG_FLAG: &str = "--config";

/// Flag switching the engine into plan-only mode.
pub const DRY_RUN_FLAG: &str = "--dry-run";

/// Whether the engine commits DDL or only reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Report the DDL without executing it.
    #[default]
    DryRun,
    /// Execute the DDL.
    Apply,
}

/// Connection and behaviour parameters shared by all engines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Server host.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Login user.
    pub user: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Database name, or database file for SQLite.
    pub database: Option<String>,
    /// Engine configuration file.
    pub config_file: Option<PathBuf>,
}

impl ConnectionParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat `name -> value` mapping.
    ///
    /// Recognised keys are `host`, `port`, `user`, `password`, `database`
    /// and `config`. Unknown keys are ignored and empty values count as unset.
    pub fn from_map<I, K, V>(entries: I) -> PreviewResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in entries {
            let Some(value) = non_empty(value.as_ref()) else {
                continue;
            };
            match key.as_ref() {
                "host" => params.host = Some(value),
                "port" => {
                    let port = value.parse::<u16>().map_err(|_| PreviewError::InvalidParameter {
                        name: "port",
                        value: value.clone(),
                    })?;
                    params.port = Some(port);
                }
                "user" => params.user = Some(value),
                "password" => params.password = Some(value),
                "database" => params.database = Some(value),
                "config" => params.config_file = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(params)
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = non_empty(&host.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the user.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = non_empty(&user.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = non_empty(&password.into());
        self
    }

    /// Set the database name or file.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = non_empty(&database.into());
        self
    }

    /// Set the engine configuration file.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// A fully built engine invocation, minus the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    args: Vec<String>,
    env: BTreeMap<String, String>,
    file_index: usize,
    dry_run_index: Option<usize>,
    password_flag: Option<&'static str>,
}

impl CommandConfig {
    /// Ordered argument list.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Environment overlay applied on top of the ambient environment.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Schema file currently passed to the engine.
    pub fn schema_file(&self) -> &str {
        &self.args[self.file_index]
    }

    /// Flag whose following argument is a secret, if the password is on argv.
    pub fn password_flag(&self) -> Option<&'static str> {
        self.password_flag
    }

    /// Whether the invocation only plans.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run_index.is_some()
    }

    /// Same invocation with a different schema file.
    pub fn with_schema_file(&self, path: &Path) -> Self {
        let mut config = self.clone();
        config.args[config.file_index] = path.to_string_lossy().into_owned();
        config
    }

    /// Baseline replay of this invocation: `path` as the schema file, always
    /// applied. Connection arguments and environment are left untouched.
    pub fn for_baseline(&self, path: &Path) -> Self {
        let mut config = self.with_schema_file(path);
        if let Some(index) = config.dry_run_index.take() {
            config.args.remove(index);
            if config.file_index > index {
                config.file_index -= 1;
            }
        }
        config
    }
}

/// Builds [`CommandConfig`] values for each database kind.
pub struct CommandConfigBuilder<'a> {
    masker: &'a dyn SecretMasker,
}

impl<'a> CommandConfigBuilder<'a> {
    /// Create a builder that registers secrets with `masker`.
    pub fn new(masker: &'a dyn SecretMasker) -> Self {
        Self { masker }
    }

    /// Build the invocation for `kind` against `schema_file`.
    pub fn build(
        &self,
        kind: DatabaseKind,
        params: &ConnectionParams,
        mode: ApplyMode,
        schema_file: &Path,
    ) -> PreviewResult<CommandConfig> {
        let profile = kind.profile();
        let database = params
            .database
            .clone()
            .ok_or(PreviewError::MissingParameter("database"))?;

        let mut args = Vec::new();
        let mut env = BTreeMap::new();
        let mut password_flag = None;

        if let Some(flags) = &profile.server {
            let host = params.host.as_deref().unwrap_or(flags.default_host);
            let port = params.port.unwrap_or(flags.default_port);
            args.push(flags.host_flag.to_string());
            args.push(host.to_string());
            args.push(flags.port_flag.to_string());
            args.push(port.to_string());

            if let Some(user) = &params.user {
                args.push(flags.user_flag.to_string());
                args.push(user.clone());
            }

            if let Some(password) = &params.password {
                self.masker.mask(password);
                match flags.password_env {
                    Some(var) => {
                        env.insert(var.to_string(), password.clone());
                    }
                    None => {
                        args.push(flags.password_flag.to_string());
                        args.push(password.clone());
                        password_flag = Some(flags.password_flag);
                    }
                }
            }
        }

        let mut dry_run_index = None;
        if mode == ApplyMode::DryRun {
            dry_run_index = Some(args.len());
            args.push(DRY_RUN_FLAG.to_string());
        }

        if let Some(config_file) = &params.config_file {
            args.push(CONFIG_FLAG.to_string());
            args.push(config_file.to_string_lossy().into_owned());
        }

        args.push(FILE_FLAG.to_string());
        args.push(schema_file.to_string_lossy().into_owned());
        let file_index = args.len() - 1;

        args.push(database);

        tracing::debug!(kind = %kind, binary = profile.binary, ?mode, "built engine command");

        Ok(CommandConfig {
            args,
            env,
            file_index,
            dry_run_index,
            password_flag,
        })
    }
}

/// Overlay `overlay` on a copy of `ambient`; overlay keys win.
pub fn merge_env<I, K, V>(ambient: I, overlay: &BTreeMap<String, String>) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut merged: BTreeMap<String, String> = ambient
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
