//! Stat results and the fixed-shape stat record handed to filesystem callers.

use std::ops::Index;

use serde::{Deserialize, Serialize};

/// `S_IFDIR | 0777`
pub const DIRECTORY_MODE: u32 = 0o040777;
/// `S_IFREG | 0777`
pub const FILE_MODE: u32 = 0o100777;

const S_IFMT: i64 = 0o170000;
const S_IFDIR: i64 = 0o040000;
const S_IFREG: i64 = 0o100000;

/// Kind of path a stat resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// What a stat learned about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResult {
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification, seconds since the Unix epoch (0 when unknown).
    pub mtime: i64,
    pub writable: bool,
}

impl StatResult {
    /// Synthetic directory: buckets, prefixes, placeholders.
    pub fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            size: 0,
            mtime: 0,
            writable: true,
        }
    }

    pub fn file(size: u64, mtime: i64) -> Self {
        Self {
            kind: EntryKind::File,
            size,
            mtime,
            writable: true,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn to_record(&self) -> StatRecord {
        match self.kind {
            EntryKind::Directory => StatRecord::directory(),
            EntryKind::File => StatRecord::file(self.size, self.mtime),
        }
    }
}

impl From<StatResult> for StatRecord {
    fn from(stat: StatResult) -> Self {
        stat.to_record()
    }
}

/// The classic 13-field stat record.
///
/// Legacy callers read it positionally (`record[7]` is the size), newer ones
/// by name (`record.size`, or [`StatRecord::field`] for dynamic lookups).
/// Both views are backed by the same fields, so they can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub dev: i64,
    pub ino: i64,
    pub mode: i64,
    pub nlink: i64,
    pub uid: i64,
    pub gid: i64,
    pub rdev: i64,
    pub size: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub blksize: i64,
    pub blocks: i64,
}

impl StatRecord {
    /// Field names in positional order.
    pub const FIELDS: [&'static str; 13] = [
        "dev", "ino", "mode", "nlink", "uid", "gid", "rdev", "size", "atime", "mtime", "ctime",
        "blksize", "blocks",
    ];

    /// All zeroes, with `-1` for the fields a blob store cannot answer.
    pub fn template() -> Self {
        Self {
            dev: 0,
            ino: 0,
            mode: 0,
            nlink: 0,
            uid: 0,
            gid: 0,
            rdev: -1,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            blksize: -1,
            blocks: -1,
        }
    }

    pub fn directory() -> Self {
        Self {
            mode: i64::from(DIRECTORY_MODE),
            ..Self::template()
        }
    }

    pub fn file(size: u64, mtime: i64) -> Self {
        Self {
            mode: i64::from(FILE_MODE),
            size: i64::try_from(size).unwrap_or(i64::MAX),
            mtime,
            ctime: mtime,
            ..Self::template()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn to_array(&self) -> [i64; 13] {
        [
            self.dev,
            self.ino,
            self.mode,
            self.nlink,
            self.uid,
            self.gid,
            self.rdev,
            self.size,
            self.atime,
            self.mtime,
            self.ctime,
            self.blksize,
            self.blocks,
        ]
    }

    /// Positional access.
    pub fn get(&self, index: usize) -> Option<i64> {
        self.to_array().get(index).copied()
    }

    /// Named access.
    pub fn field(&self, name: &str) -> Option<i64> {
        Self::FIELDS
            .iter()
            .position(|f| *f == name)
            .and_then(|i| self.get(i))
    }
}

impl Index<usize> for StatRecord {
    type Output = i64;

    fn index(&self, index: usize) -> &i64 {
        match index {
            0 => &self.dev,
            1 => &self.ino,
            2 => &self.mode,
            3 => &self.nlink,
            4 => &self.uid,
            5 => &self.gid,
            6 => &self.rdev,
            7 => &self.size,
            8 => &self.atime,
            9 => &self.mtime,
            10 => &self.ctime,
            11 => &self.blksize,
            12 => &self.blocks,
            _ => panic!("stat record index out of range: {index}"),
        }
    }
}

impl Index<&str> for StatRecord {
    type Output = i64;

    fn index(&self, name: &str) -> &i64 {
        match Self::FIELDS.iter().position(|f| *f == name) {
            Some(i) => &self[i],
            None => panic!("unknown stat field: {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_record() {
        let rec = StatRecord::directory();
        assert_eq!(rec.mode, 0o040777);
        assert_eq!(rec.size, 0);
        assert!(rec.is_dir());
        assert!(!rec.is_file());
        assert_eq!(rec.rdev, -1);
        assert_eq!(rec.blksize, -1);
        assert_eq!(rec.blocks, -1);
    }

    #[test]
    fn test_file_record() {
        let rec = StatRecord::file(5, 1_700_000_000);
        assert_eq!(rec.mode, 0o100777);
        assert!(rec.is_file());
        assert_eq!(rec.size, 5);
        assert_eq!(rec.mtime, 1_700_000_000);
        assert_eq!(rec.ctime, 1_700_000_000);
        assert_eq!(rec.atime, 0);
    }

    #[test]
    fn test_positional_and_named_views_agree() {
        let rec = StatRecord::file(42, 7);
        for (i, name) in StatRecord::FIELDS.iter().enumerate() {
            assert_eq!(rec.get(i), rec.field(name), "field {name}");
            assert_eq!(rec[i], rec[*name]);
        }
        assert_eq!(rec[7], 42);
        assert_eq!(rec["mtime"], 7);
        assert_eq!(rec.get(13), None);
        assert_eq!(rec.field("nope"), None);
    }

    #[test]
    fn test_stat_result_to_record() {
        assert!(StatResult::directory().to_record().is_dir());
        let rec: StatRecord = StatResult::file(3, 9).into();
        assert_eq!((rec.size, rec.mtime), (3, 9));
    }

    #[test]
    fn test_record_serializes_named_fields() {
        let json = serde_json::to_value(StatRecord::directory()).unwrap();
        assert_eq!(json["mode"], 0o040777);
        assert_eq!(json["blocks"], -1);
    }
}
