//! Package identifiers, inventories and the package database boundary

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::Result;
use crate::error::Error;
use crate::target::Side;

/// Installed key packages carry no payload and are never compared.
pub const GPG_PUBKEY: &str = "gpg-pubkey";

/// A bare package name or a `name-epoch-version-release` string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PackageId {
    fn from(value: &str) -> Self {
        PackageId(value.to_string())
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a `name-epoch-version-release` record and return its name.
fn record_name(entry: &str) -> std::result::Result<&str, String> {
    let mut parts = entry.rsplitn(4, '-');
    let release = parts.next().unwrap_or_default();
    let version = parts.next().unwrap_or_default();
    let epoch = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    if name.is_empty() || version.is_empty() || release.is_empty() {
        return Err("expected name-epoch-version-release".to_string());
    }
    if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("epoch {epoch:?} is not numeric"));
    }
    Ok(name)
}

/// Sorted, duplicate-free identifiers of one target plus its release label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    packages: Vec<PackageId>,
    release: String,
    names_only: bool,
}

impl Inventory {
    pub fn new<I>(packages: I, release: impl Into<String>, names_only: bool) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PackageId>,
    {
        let mut packages: Vec<PackageId> = packages.into_iter().map(Into::into).collect();
        packages.sort();
        packages.dedup();
        Self {
            packages,
            release: release.into(),
            names_only,
        }
    }

    pub fn packages(&self) -> &[PackageId] {
        &self.packages
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn names_only(&self) -> bool {
        self.names_only
    }
}

/// Reads package metadata out of a mounted root.
pub trait PackageSource {
    /// Whether the root is managed by this package manager at all.
    fn is_package_based(&self, root: &Path) -> bool;
    /// Raw `name-epoch-version-release` records, one per line.
    fn query(&self, root: &Path) -> io::Result<String>;
    /// Free-text release label of the root.
    fn release(&self, root: &Path) -> io::Result<String>;
}

/// Turn raw query output into identifiers, dropping blank lines and `gpg-pubkey`.
pub fn parse_query_output(
    raw: &str,
    names_only: bool,
    side: Side,
    name: &str,
) -> Result<Vec<PackageId>> {
    let mut ids = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let package = record_name(line).map_err(|reason| Error::MalformedInventory {
            side,
            name: name.to_string(),
            entry: line.to_string(),
            reason,
        })?;
        if package == GPG_PUBKEY {
            continue;
        }
        ids.push(if names_only {
            PackageId::from(package)
        } else {
            PackageId::from(line)
        });
    }
    Ok(ids)
}

/// Build the inventory of one target through a package source.
pub fn load_inventory(
    source: &dyn PackageSource,
    side: Side,
    name: &str,
    root: &Path,
    names_only: bool,
) -> Result<Inventory> {
    if !source.is_package_based(root) {
        return Err(Error::UnsupportedTarget {
            side,
            name: name.to_string(),
        });
    }
    let query_failed = |e: io::Error| Error::PackageQuery {
        side,
        name: name.to_string(),
        message: e.to_string(),
    };
    let raw = source.query(root).map_err(query_failed)?;
    let packages = parse_query_output(&raw, names_only, side, name)?;
    let release = source.release(root).map_err(query_failed)?;
    log::debug!("{} ({}): {} packages", name, side, packages.len());
    Ok(Inventory::new(packages, release, names_only))
}

/// The host `rpm` binary queried against a mounted root.
#[derive(Debug, Clone)]
pub struct RpmDatabase {
    program: PathBuf,
}

impl RpmDatabase {
    const QUERY_FORMAT: &'static str = "%{NAME}-%{EPOCHNUM}-%{VERSION}-%{RELEASE}\\n";
    const MARKER: &'static str = "usr/bin/rpm";
    const RELEASE_FILE: &'static str = "etc/redhat-release";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for RpmDatabase {
    fn default() -> Self {
        Self::new("rpm")
    }
}

impl PackageSource for RpmDatabase {
    fn is_package_based(&self, root: &Path) -> bool {
        root.join(Self::MARKER).symlink_metadata().is_ok()
    }

    fn query(&self, root: &Path) -> io::Result<String> {
        // rpm wants an absolute --root
        let root = std::path::absolute(root)?;
        let output = Command::new(&self.program)
            .arg("--root")
            .arg(&root)
            .args(["-qa", "--nosignature", "--nodigest", "--queryformat"])
            .arg(Self::QUERY_FORMAT)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn release(&self, root: &Path) -> io::Result<String> {
        match std::fs::read_to_string(root.join(Self::RELEASE_FILE)) {
            Ok(release) => Ok(release),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}
