//! Change tracking between live engine state and last-persisted records.
//!
//! # Design
//! - Only an explicit, fixed field set is tracked; anything absent from a change
//!   is unchanged.
//! - Comparison is exact equality for every field, so diffing a state against
//!   itself always yields an empty change.

use std::collections::BTreeMap;

use crate::model::{FileAttributes, FileSnapshot, TorrentAttributes};
use crate::status::TorrentStatus;

/// New value for a tracked field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Text column.
    Text(String),
    /// Unsigned integer column, kept at full width. Clamped only when bound.
    Integer(u64),
    /// Status column, written through the status codec.
    Status(TorrentStatus),
}

/// Tracked torrent columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TorrentField {
    /// `status`
    Status,
    /// `name`
    Name,
    /// `save_path`
    SavePath,
    /// `size`
    Size,
    /// `progress`
    Progress,
    /// `remaining`
    Remaining,
    /// `seeds`
    Seeds,
    /// `total_seeds`
    TotalSeeds,
    /// `leechers`
    Leechers,
    /// `total_leechers`
    TotalLeechers,
}

impl TorrentField {
    /// Every tracked torrent field.
    pub const ALL: [Self; 10] = [
        Self::Status,
        Self::Name,
        Self::SavePath,
        Self::Size,
        Self::Progress,
        Self::Remaining,
        Self::Seeds,
        Self::TotalSeeds,
        Self::Leechers,
        Self::TotalLeechers,
    ];

    /// Column backing the field in the `torrents` table.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Name => "name",
            Self::SavePath => "save_path",
            Self::Size => "size",
            Self::Progress => "progress",
            Self::Remaining => "remaining",
            Self::Seeds => "seeds",
            Self::TotalSeeds => "total_seeds",
            Self::Leechers => "leechers",
            Self::TotalLeechers => "total_leechers",
        }
    }
}

/// Tracked file columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileField {
    /// `path`
    Path,
    /// `size`
    Size,
    /// `priority`
    Priority,
    /// `progress`
    Progress,
}

impl FileField {
    /// Every tracked file field.
    pub const ALL: [Self; 4] = [Self::Path, Self::Size, Self::Priority, Self::Progress];

    /// Column backing the field in the `torrent_files` table.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Size => "size",
            Self::Priority => "priority",
            Self::Progress => "progress",
        }
    }
}

/// Sparse map of changed fields to their new values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange<F: Ord> {
    fields: BTreeMap<F, FieldValue>,
}

impl<F: Ord> Default for PendingChange<F> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }
}

impl<F: Ord + Copy> PendingChange<F> {
    /// Record a new value for `field`, replacing any earlier one.
    pub fn set(&mut self, field: F, value: FieldValue) {
        self.fields.insert(field, value);
    }

    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// New value for `field`, if it changed.
    #[must_use]
    pub fn get(&self, field: F) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// Iterate changed fields in column order.
    pub fn iter(&self) -> impl Iterator<Item = (F, &FieldValue)> {
        self.fields.iter().map(|(field, value)| (*field, value))
    }

    /// Whether every field in `all` is present.
    #[must_use]
    pub fn covers(&self, all: &[F]) -> bool {
        all.iter().all(|field| self.fields.contains_key(field))
    }

    /// Fold a later change into this one; later values win.
    pub fn merge(&mut self, later: Self) {
        self.fields.extend(later.fields);
    }
}

/// Changes for a torrent row.
pub type TorrentChange = PendingChange<TorrentField>;
/// Changes for a single file row.
pub type FileChange = PendingChange<FileField>;
/// File changes keyed by file index.
pub type FileChanges = BTreeMap<u32, FileChange>;

fn to_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn to_u16(value: u64) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

impl TorrentAttributes {
    /// Current value of a tracked field.
    #[must_use]
    pub fn value(&self, field: TorrentField) -> FieldValue {
        match field {
            TorrentField::Status => FieldValue::Status(self.status),
            TorrentField::Name => FieldValue::Text(self.name.clone()),
            TorrentField::SavePath => FieldValue::Text(self.save_path.clone()),
            TorrentField::Size => FieldValue::Integer(self.size),
            TorrentField::Progress => FieldValue::Integer(u64::from(self.progress)),
            TorrentField::Remaining => FieldValue::Integer(self.remaining),
            TorrentField::Seeds => FieldValue::Integer(u64::from(self.seeds)),
            TorrentField::TotalSeeds => FieldValue::Integer(u64::from(self.total_seeds)),
            TorrentField::Leechers => FieldValue::Integer(u64::from(self.leechers)),
            TorrentField::TotalLeechers => FieldValue::Integer(u64::from(self.total_leechers)),
        }
    }

    /// Apply a change in place. Values of the wrong kind for a field are ignored.
    pub fn apply(&mut self, change: &TorrentChange) {
        for (field, value) in change.iter() {
            match (field, value) {
                (TorrentField::Status, FieldValue::Status(status)) => self.status = *status,
                (TorrentField::Name, FieldValue::Text(text)) => self.name.clone_from(text),
                (TorrentField::SavePath, FieldValue::Text(text)) => {
                    self.save_path.clone_from(text);
                }
                (TorrentField::Size, FieldValue::Integer(v)) => self.size = *v,
                (TorrentField::Progress, FieldValue::Integer(v)) => self.progress = to_u16(*v),
                (TorrentField::Remaining, FieldValue::Integer(v)) => self.remaining = *v,
                (TorrentField::Seeds, FieldValue::Integer(v)) => self.seeds = to_u32(*v),
                (TorrentField::TotalSeeds, FieldValue::Integer(v)) => {
                    self.total_seeds = to_u32(*v);
                }
                (TorrentField::Leechers, FieldValue::Integer(v)) => self.leechers = to_u32(*v),
                (TorrentField::TotalLeechers, FieldValue::Integer(v)) => {
                    self.total_leechers = to_u32(*v);
                }
                _ => {}
            }
        }
    }

    /// Change that mirrors the shutdown correction: active statuses pause and
    /// peer counters drop to zero.
    #[must_use]
    pub fn shutdown_correction(&self) -> TorrentChange {
        let mut corrected = self.clone();
        corrected.status = self.status.on_shutdown();
        corrected.seeds = 0;
        corrected.total_seeds = 0;
        corrected.leechers = 0;
        corrected.total_leechers = 0;
        diff_torrent(&corrected, self)
    }
}

impl FileAttributes {
    /// Current value of a tracked field.
    #[must_use]
    pub fn value(&self, field: FileField) -> FieldValue {
        match field {
            FileField::Path => FieldValue::Text(self.path.clone()),
            FileField::Size => FieldValue::Integer(self.size),
            FileField::Priority => FieldValue::Integer(u64::from(self.priority)),
            FileField::Progress => FieldValue::Integer(u64::from(self.progress)),
        }
    }

    /// Apply a change in place. Values of the wrong kind for a field are ignored.
    pub fn apply(&mut self, change: &FileChange) {
        for (field, value) in change.iter() {
            match (field, value) {
                (FileField::Path, FieldValue::Text(text)) => self.path.clone_from(text),
                (FileField::Size, FieldValue::Integer(v)) => self.size = *v,
                (FileField::Priority, FieldValue::Integer(v)) => {
                    self.priority = u8::try_from(*v).unwrap_or(u8::MAX);
                }
                (FileField::Progress, FieldValue::Integer(v)) => self.progress = to_u16(*v),
                _ => {}
            }
        }
    }

    /// Build attributes from a change that covers every file field.
    #[must_use]
    pub fn from_change(change: &FileChange) -> Option<Self> {
        if !change.covers(&FileField::ALL) {
            return None;
        }
        let mut attributes = Self {
            path: String::new(),
            size: 0,
            priority: 0,
            progress: 0,
        };
        attributes.apply(change);
        Some(attributes)
    }

    fn full_change(&self) -> FileChange {
        let mut change = FileChange::default();
        for field in FileField::ALL {
            change.set(field, self.value(field));
        }
        change
    }
}

/// Diff live torrent attributes against the last-known record.
#[must_use]
pub fn diff_torrent(live: &TorrentAttributes, last_known: &TorrentAttributes) -> TorrentChange {
    let mut change = TorrentChange::default();
    for field in TorrentField::ALL {
        let current = live.value(field);
        if current != last_known.value(field) {
            change.set(field, current);
        }
    }
    change
}

/// Diff live files against last-known file rows.
///
/// Files without a last-known row produce a change covering every field.
#[must_use]
pub fn diff_files(
    live: &[FileSnapshot],
    last_known: &BTreeMap<u32, FileAttributes>,
) -> FileChanges {
    let mut changes = FileChanges::new();
    for file in live {
        let change = match last_known.get(&file.index) {
            Some(known) => {
                let mut change = FileChange::default();
                for field in FileField::ALL {
                    let current = file.attributes.value(field);
                    if current != known.value(field) {
                        change.set(field, current);
                    }
                }
                change
            }
            None => file.attributes.full_change(),
        };
        if !change.is_empty() {
            changes.insert(file.index, change);
        }
    }
    changes
}
