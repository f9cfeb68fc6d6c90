//! File entry lines and their four-byte flag field

use crate::invalid_entry;
use relcheck_errors::Error;
use relcheck_hash::ContentHash;
use relcheck_types::ReleaseVersion;

/// First flag byte: what kind of object the entry names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    Link,
    /// A sub-manifest reference (root index entries)
    Manifest,
    /// No object of its own, e.g. the source side of a rename
    Unset,
}

/// Second flag byte: lifecycle status of the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Active,
    Deleted,
    /// Removed from tracking but intentionally left on disk
    Ghosted,
}

/// One row of a manifest
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path name, or bundle name for root index entries
    pub name: String,
    /// Release version at which this entry last changed
    pub version: ReleaseVersion,
    /// Recorded content hash
    pub hash: ContentHash,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    /// Third flag byte, carried verbatim (config/state/boot markers)
    pub modifier: char,
    /// Whether the entry participates in a rename pair
    pub rename: bool,
}

impl FileEntry {
    /// Parse one `<flags>\t<hash>\t<version>\t<name>` line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not have four tab-separated
    /// fields or any field is malformed.
    pub fn parse(manifest: &str, line_no: usize, line: &str) -> Result<Self, Error> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return Err(invalid_entry(
                manifest,
                line_no,
                format!("expected 4 fields, found {}", fields.len()),
            ));
        }

        let flags: Vec<char> = fields[0].chars().collect();
        if flags.len() != 4 {
            return Err(invalid_entry(
                manifest,
                line_no,
                format!("invalid flag field {:?}", fields[0]),
            ));
        }

        let entry_type = match flags[0] {
            'F' => EntryType::File,
            'D' => EntryType::Directory,
            'L' => EntryType::Link,
            'M' => EntryType::Manifest,
            '.' => EntryType::Unset,
            other => {
                return Err(invalid_entry(
                    manifest,
                    line_no,
                    format!("unknown entry type {other:?}"),
                ))
            }
        };

        let status = match flags[1] {
            '.' => EntryStatus::Active,
            'd' => EntryStatus::Deleted,
            'g' => EntryStatus::Ghosted,
            other => {
                return Err(invalid_entry(
                    manifest,
                    line_no,
                    format!("unknown entry status {other:?}"),
                ))
            }
        };

        let hash = ContentHash::from_hex(fields[1])
            .map_err(|e| invalid_entry(manifest, line_no, e.to_string()))?;

        let version: ReleaseVersion = fields[2]
            .parse()
            .map_err(|_| invalid_entry(manifest, line_no, format!("invalid version {:?}", fields[2])))?;

        let name = fields[3];
        if name.is_empty() {
            return Err(invalid_entry(manifest, line_no, "empty name".to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            version,
            hash,
            entry_type,
            status,
            modifier: flags[2],
            rename: flags[3] == 'r',
        })
    }

    /// Whether the entry has retrievable byte content of its own.
    ///
    /// Only present entries are subject to blob verification;
    /// directories, deletions, ghosts, and unset-type rename markers
    /// are logical-only.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.status == EntryStatus::Active
            && matches!(self.entry_type, EntryType::File | EntryType::Link)
    }
}
