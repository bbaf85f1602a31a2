//! Database kinds and the per-engine flag tables.
//!
//! Every engine binary takes slightly different flags. In particular the
//! SQL Server engine swaps the meaning of `-p` and `-P` relative to the
//! MySQL engine, so flags are looked up from a profile instead of being
//! shared constants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PreviewError;

/// Output lines the engines print when there is nothing to apply.
pub const NO_CHANGE_SENTINELS: &[&str] = &["-- Nothing is modified --", "Nothing is modified"];

/// Logical database kinds supported by the engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// MySQL / MariaDB.
    Mysql,
    /// PostgreSQL.
    Postgresql,
    /// SQLite (file based).
    Sqlite,
    /// Microsoft SQL Server.
    Mssql,
}

impl DatabaseKind {
    /// All supported kinds.
    pub const ALL: [DatabaseKind; 4] = [
        DatabaseKind::Mysql,
        DatabaseKind::Postgresql,
        DatabaseKind::Sqlite,
        DatabaseKind::Mssql,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Postgresql => "postgresql",
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::Mssql => "mssql",
        }
    }

    /// Flag table for this kind.
    pub fn profile(&self) -> &'static EngineProfile {
        match self {
            DatabaseKind::Mysql => &MYSQL,
            DatabaseKind::Postgresql => &POSTGRESQL,
            DatabaseKind::Sqlite => &SQLITE,
            DatabaseKind::Mssql => &MSSQL,
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DatabaseKind::Mysql),
            "postgresql" | "postgres" => Ok(DatabaseKind::Postgresql),
            "sqlite" | "sqlite3" => Ok(DatabaseKind::Sqlite),
            "mssql" | "sqlserver" => Ok(DatabaseKind::Mssql),
            _ => Err(PreviewError::UnsupportedDatabaseKind(s.to_string())),
        }
    }
}

/// Network connection flags for engines that talk to a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFlags {
    /// Host used when none is supplied.
    pub default_host: &'static str,
    /// Port used when none is supplied.
    pub default_port: u16,
    /// Flag preceding the host.
    pub host_flag: &'static str,
    /// Flag preceding the port.
    pub port_flag: &'static str,
    /// Flag preceding the user name.
    pub user_flag: &'static str,
    /// Flag preceding the password.
    pub password_flag: &'static str,
    /// When set, the password travels in this environment variable instead of argv.
    pub password_env: Option<&'static str>,
}

/// Static description of one engine binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    /// Database kind served by this binary.
    pub kind: DatabaseKind,
    /// Executable name (without platform suffix).
    pub binary: &'static str,
    /// Server flags, `None` for file-based engines.
    pub server: Option<ServerFlags>,
}

impl EngineProfile {
    /// Executable file name on the given OS family.
    pub fn executable_name(&self, os: &str) -> String {
        if os == "windows" {
            format!("{}.exe", self.binary)
        } else {
            self.binary.to_string()
        }
    }
}

static MYSQL: EngineProfile = EngineProfile {
    kind: DatabaseKind::Mysql,
    binary: "mysqldef",
    server: Some(ServerFlags {
        default_host: "127.0.0.1",
        default_port: 3306,
        host_flag: "-h",
        port_flag: "-P",
        user_flag: "-u",
        password_flag: "-p",
        password_env: Some("MYSQL_PWD"),
    }),
};

static POSTGRESQL: EngineProfile = EngineProfile {
    kind: DatabaseKind::Postgresql,
    binary: "psqldef",
    server: Some(ServerFlags {
        default_host: "localhost",
        default_port: 5432,
        host_flag: "-h",
        port_flag: "-p",
        user_flag: "-U",
        password_flag: "-W",
        password_env: Some("PGPASSWORD"),
    }),
};

static MSSQL: EngineProfile = EngineProfile {
    kind: DatabaseKind::Mssql,
    binary: "mssqldef",
    server: Some(ServerFlags {
        default_host: "localhost",
        default_port: 1433,
        host_flag: "-h",
        port_flag: "-p",
        user_flag: "-U",
        password_flag: "-P",
        password_env: None,
    }),
};

static SQLITE: EngineProfile = EngineProfile {
    kind: DatabaseKind::Sqlite,
    binary: "sqlite3def",
    server: None,
};

/// Whether engine output means "nothing to apply".
pub fn is_no_change_output(output: &str) -> bool {
    let trimmed = output.trim();
    trimmed.is_empty()
        || trimmed
            .lines()
            .map(str::trim)
            .any(|line| NO_CHANGE_SENTINELS.contains(&line))
}
