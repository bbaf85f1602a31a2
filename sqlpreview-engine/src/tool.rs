//! Engine binary resolution.
//!
//! Maps the host platform and a database kind to a release asset, downloads
//! it, unpacks it into a temporary directory and hands back the path to the
//! executable inside.
//!
//! ```text
//! <base>/download/<tag>/<binary>_<os>_<arch>.<ext>
//! <base>/latest/download/<binary>_<os>_<arch>.<ext>
//! ```

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{PreviewError, PreviewResult};
use crate::kind::DatabaseKind;

/// Default location of the engine releases.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com/sqldef/sqldef/releases";

/// Normalised operating system and architecture labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// One of `linux`, `darwin`, `windows`.
    pub os: &'static str,
    /// One of `amd64`, `arm64`, `arm`, `386`.
    pub arch: &'static str,
}

impl Platform {
    /// Platform of the running process.
    pub fn host() -> PreviewResult<Self> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Normalise raw OS/architecture labels and check an artifact is published.
    pub fn from_parts(os: &str, arch: &str) -> PreviewResult<Self> {
        let unsupported = || PreviewError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let os_label = match os {
            "linux" => "linux",
            "macos" | "darwin" => "darwin",
            "windows" => "windows",
            _ => return Err(unsupported()),
        };
        let arch_label = match arch {
            "x86_64" | "amd64" => "amd64",
            "aarch64" | "arm64" => "arm64",
            "arm" | "armv7" => "arm",
            "x86" | "i386" | "i686" | "386" => "386",
            _ => return Err(unsupported()),
        };

        match (os_label, arch_label) {
            ("linux", _) | ("darwin", "amd64" | "arm64") | ("windows", "amd64") => Ok(Self {
                os: os_label,
                arch: arch_label,
            }),
            _ => Err(unsupported()),
        }
    }

    /// Archive format used for this platform's assets.
    pub fn archive_format(&self) -> ArchiveFormat {
        if self.os == "windows" {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        }
    }
}

/// Release archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball.
    TarGz,
    /// Zip archive.
    Zip,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// Requested engine version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ToolVersion {
    /// Whatever the release host currently marks as latest.
    #[default]
    Latest,
    /// A concrete release tag such as `v0.17.0`.
    Tag(String),
}

impl ToolVersion {
    /// Parse a version selector. Empty or `latest` selects [`ToolVersion::Latest`].
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            return ToolVersion::Latest;
        }
        if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            ToolVersion::Tag(format!("v{}", trimmed))
        } else {
            ToolVersion::Tag(trimmed.to_string())
        }
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolVersion::Latest => f.write_str("latest"),
            ToolVersion::Tag(tag) => f.write_str(tag),
        }
    }
}

/// Everything needed to name and locate one engine artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolSpec {
    /// Database kind.
    pub kind: DatabaseKind,
    /// Requested version.
    pub version: ToolVersion,
    /// Target platform.
    pub platform: Platform,
}

impl ToolSpec {
    /// Describe the release asset for a kind, version and platform.
    pub fn new(kind: DatabaseKind, version: ToolVersion, platform: Platform) -> Self {
        Self {
            kind,
            version,
            platform,
        }
    }

    /// Release asset file name, e.g. `psqldef_linux_amd64.tar.gz`.
    pub fn asset_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.kind.profile().binary,
            self.platform.os,
            self.platform.arch,
            self.platform.archive_format().extension()
        )
    }

    /// Full download URL below `base_url`.
    pub fn download_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match &self.version {
            ToolVersion::Latest => format!("{}/latest/download/{}", base, self.asset_name()),
            ToolVersion::Tag(tag) => format!("{}/download/{}/{}", base, tag, self.asset_name()),
        }
    }

    /// Executable file name inside the archive.
    pub fn executable_name(&self) -> String {
        self.kind.profile().executable_name(self.platform.os)
    }
}

/// A usable engine executable.
///
/// When the executable was downloaded, the handle owns the extraction
/// directory and removes it on drop.
#[derive(Debug)]
pub struct ResolvedTool {
    executable: PathBuf,
    label: String,
    _workdir: Option<TempDir>,
}

impl ResolvedTool {
    /// Wrap an executable that already exists on disk.
    pub fn at(executable: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            label: label.into(),
            _workdir: None,
        }
    }

    /// Path to the executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Human label such as `mysqldef v0.17.0`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Source of engine executables.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Produce an executable for `kind` at `version`.
    async fn resolve(&self, kind: DatabaseKind, version: &ToolVersion) -> PreviewResult<ResolvedTool>;
}

/// Downloads engine executables from the release host.
///
/// Every call downloads afresh into a new temporary directory.
#[derive(Debug, Clone)]
pub struct ToolResolver {
    client: reqwest::Client,
    base_url: String,
    platform: Option<Platform>,
}

impl ToolResolver {
    /// Create a resolver for the default release host.
    pub fn new() -> PreviewResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sqlpreview/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            platform: None,
        })
    }

    /// Use a different release host (mirror or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve for a fixed platform instead of the host.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    fn platform(&self) -> PreviewResult<Platform> {
        match self.platform {
            Some(platform) => Ok(platform),
            None => Platform::host(),
        }
    }
}

#[async_trait]
impl ToolSource for ToolResolver {
    async fn resolve(&self, kind: DatabaseKind, version: &ToolVersion) -> PreviewResult<ResolvedTool> {
        let spec = ToolSpec::new(kind, version.clone(), self.platform()?);
        let url = spec.download_url(&self.base_url);
        info!(%url, "downloading engine");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PreviewError::download(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::download(&url, format!("HTTP {}", status)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PreviewError::download(&url, e))?;

        let workdir = tempfile::Builder::new()
            .prefix("sqlpreview-engine-")
            .tempdir()?;
        let archive = workdir.path().join(spec.asset_name());
        tokio::fs::write(&archive, &bytes).await?;

        let extract_root = workdir.path().join("extract");
        let format = spec.platform.archive_format();
        let root = extract_root.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &root, format))
            .await
            .map_err(|e| PreviewError::download(&url, e))?
            .map_err(|e| PreviewError::download(&url, e))?;

        let name = spec.executable_name();
        let executable =
            find_file(&extract_root, &name)?.ok_or_else(|| PreviewError::BinaryNotFound {
                binary: name.clone(),
                root: extract_root.display().to_string(),
            })?;
        make_executable(&executable)?;
        debug!(path = %executable.display(), "engine ready");

        Ok(ResolvedTool {
            executable,
            label: format!("{} {}", kind.profile().binary, spec.version),
            _workdir: Some(workdir),
        })
    }
}

/// Unpack `archive` into `dest`.
pub fn extract_archive(archive: &Path, dest: &Path, format: ArchiveFormat) -> io::Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    match format {
        ArchiveFormat::TarGz => {
            let mut tarball = tar::Archive::new(flate2::read::GzDecoder::new(file));
            tarball.unpack(dest)
        }
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file).map_err(io::Error::other)?;
            zip.extract(dest).map_err(io::Error::other)
        }
    }
}

/// Depth-first search for a regular file called `name` below `root`.
fn find_file(root: &Path, name: &str) -> io::Result<Option<PathBuf>> {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && entry.file_name() == name {
                return Ok(Some(path));
            }
        }
    }
    Ok(None)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
