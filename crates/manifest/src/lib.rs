#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Update-stream manifest handling for relcheck
//!
//! This crate parses the tab-separated manifest format used by the
//! update server: a header block (format, version, file counts), a
//! blank line, then one file entry per line. The root index is itself a
//! manifest ("MoM", Manifest of Manifests) whose entries name the
//! per-bundle manifests and the versions at which they last changed.

mod entry;
mod layout;

pub use entry::{EntryStatus, EntryType, FileEntry};
pub use layout::CacheLayout;

use relcheck_errors::{Error, ManifestError};
use relcheck_hash::ContentHash;
use relcheck_types::ReleaseVersion;
use std::path::Path;

/// Bundle name of the root index manifest
pub const MOM_NAME: &str = "MoM";

/// Parsed manifest header block
#[derive(Debug, Clone, Default)]
pub struct ManifestHeader {
    /// Manifest format generation
    pub format: u32,
    /// Version this manifest was published at
    pub version: ReleaseVersion,
    /// Version of the previous publication of this manifest
    pub previous: ReleaseVersion,
    /// Declared number of entries
    pub file_count: u64,
    /// Publication timestamp (seconds since epoch)
    pub timestamp: u64,
    /// Declared total content size in bytes
    pub content_size: u64,
    /// Minimum version clients may delta from
    pub min_version: ReleaseVersion,
}

/// A named, versioned manifest listing file entries for one bundle
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Bundle name ("MoM" for the root index)
    pub name: String,
    pub header: ManifestHeader,
    /// Entries with active status, in file order
    pub files: Vec<FileEntry>,
    /// Deleted and ghosted entries, kept separately
    pub deleted: Vec<FileEntry>,
}

impl Manifest {
    /// Parse a manifest from its text content.
    ///
    /// # Errors
    ///
    /// Returns an error if the header block or any entry line is
    /// malformed.
    pub fn parse(name: &str, content: &str) -> Result<Self, Error> {
        let mut lines = content.lines().enumerate();

        let mut header = ManifestHeader::default();
        let mut saw_magic = false;

        for (line_no, line) in lines.by_ref() {
            if line.is_empty() {
                break;
            }
            let mut fields = line.split('\t');
            let key = fields.next().unwrap_or_default();
            let value = fields.next().ok_or_else(|| ManifestError::InvalidHeader {
                line: line.to_string(),
            })?;

            match key {
                "MANIFEST" => {
                    header.format = parse_u32(name, line_no, value)?;
                    saw_magic = true;
                }
                "version:" => header.version = parse_u32(name, line_no, value)?,
                "previous:" => header.previous = parse_u32(name, line_no, value)?,
                "filecount:" => header.file_count = parse_u64(name, line_no, value)?,
                "timestamp:" => header.timestamp = parse_u64(name, line_no, value)?,
                "contentsize:" => header.content_size = parse_u64(name, line_no, value)?,
                "minversion:" => header.min_version = parse_u32(name, line_no, value)?,
                // includes: and other header extensions are not integrity
                // relevant; accept and ignore them
                _ => {}
            }
        }

        if !saw_magic {
            return Err(ManifestError::ParseFailed {
                path: name.to_string(),
                message: "missing MANIFEST header line".to_string(),
            }
            .into());
        }

        let mut files = Vec::new();
        let mut deleted = Vec::new();

        for (line_no, line) in lines {
            if line.is_empty() {
                continue;
            }
            let entry = FileEntry::parse(name, line_no, line)?;
            if entry.status == EntryStatus::Active {
                files.push(entry);
            } else {
                deleted.push(entry);
            }
        }

        Ok(Self {
            name: name.to_string(),
            header,
            files,
            deleted,
        })
    }

    /// Load and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotFound`] if the file does not exist,
    /// or a parse error for malformed content.
    pub async fn from_file(name: &str, path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::from(ManifestError::NotFound {
                    path: path.display().to_string(),
                })
            } else {
                Error::io_with_path(&e, path)
            }
        })?;
        Self::parse(name, &content)
    }

    /// Load the manifest for `name` at `version` from the local cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest file is missing or malformed.
    pub async fn load(
        layout: &CacheLayout,
        version: ReleaseVersion,
        name: &str,
    ) -> Result<Self, Error> {
        Self::from_file(name, &layout.manifest_path(version, name)).await
    }

    /// Load the root index for `version` from the local cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the MoM file is missing or malformed.
    pub async fn load_mom(layout: &CacheLayout, version: ReleaseVersion) -> Result<Self, Error> {
        Self::load(layout, version, MOM_NAME).await
    }

    /// Distinct versions referenced by this manifest's file entries.
    ///
    /// These are the candidate from-versions a delta pack may have been
    /// published for.
    #[must_use]
    pub fn referenced_versions(&self) -> Vec<ReleaseVersion> {
        let mut versions: Vec<ReleaseVersion> = self.files.iter().map(|f| f.version).collect();
        versions.sort_unstable();
        versions.dedup();
        versions
    }

    /// Look up the recorded hash for an entry by name
    #[must_use]
    pub fn entry_hash(&self, name: &str) -> Option<&ContentHash> {
        self.files.iter().find(|f| f.name == name).map(|f| &f.hash)
    }
}

fn parse_u32(name: &str, line_no: usize, value: &str) -> Result<u32, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_entry(name, line_no, format!("invalid number {value:?}")))
}

fn parse_u64(name: &str, line_no: usize, value: &str) -> Result<u64, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_entry(name, line_no, format!("invalid number {value:?}")))
}

pub(crate) fn invalid_entry(name: &str, line_no: usize, message: String) -> Error {
    ManifestError::InvalidEntry {
        path: name.to_string(),
        line_no: line_no + 1,
        message,
    }
    .into()
}
