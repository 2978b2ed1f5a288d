//! Cached stat records and the values derived from them.

use std::fs;
use std::path::Path;

/// Sentinel returned by numeric accessors when nothing is known.
pub const UNKNOWN: i64 = -1;

/// Kind of filesystem entry, as reported without following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Link,
    /// Anything else (fifo, socket, device).
    Other,
}

impl FileKind {
    /// Short name used in listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Directory => "dir",
            FileKind::Link => "link",
            FileKind::Other => "other",
        }
    }
}

/// Owner permission bits.
pub mod owner_bits {
    pub const READ: u32 = 0o400;
    pub const WRITE: u32 = 0o200;
    pub const EXECUTE: u32 = 0o100;
}

/// A single stat call's worth of metadata, copied out of `fs::Metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    pub kind: FileKind,
    pub size: u64,
    /// Permission bits (`st_mode & 0o7777`).
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub inode: u64,
    pub device: u64,
    pub nlink: u64,
    /// Seconds since the Unix epoch, `None` when the platform doesn't say.
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
    pub ctime: Option<i64>,
}

impl StatRecord {
    /// Perform one `lstat` on `path`.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(Self::from_metadata(&metadata))
    }

    /// Copy the fields we care about out of `metadata`.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            kind: kind_of(metadata),
            size: metadata.len(),
            mode: metadata.mode() & 0o7777,
            uid: metadata.uid(),
            gid: metadata.gid(),
            inode: metadata.ino(),
            device: metadata.dev(),
            nlink: metadata.nlink(),
            atime: Some(metadata.atime()),
            mtime: Some(metadata.mtime()),
            ctime: Some(metadata.ctime()),
        }
    }

    /// Copy the fields we care about out of `metadata` (non-Unix fallback).
    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        // Owner bits are synthesized from the read-only flag
        let mut mode = owner_bits::READ;
        if !metadata.permissions().readonly() {
            mode |= owner_bits::WRITE;
        }
        if metadata.is_dir() {
            mode |= owner_bits::EXECUTE;
        }

        Self {
            kind: kind_of(metadata),
            size: metadata.len(),
            mode,
            uid: 0,
            gid: 0,
            inode: 0,
            device: 0,
            nlink: 1,
            atime: epoch_seconds(metadata.accessed()),
            mtime: epoch_seconds(metadata.modified()),
            ctime: epoch_seconds(metadata.created()),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_link(&self) -> bool {
        self.kind == FileKind::Link
    }

    /// Check an owner permission bit (see [`owner_bits`]).
    pub fn owner_can(&self, bit: u32) -> bool {
        self.mode & bit != 0
    }
}

fn kind_of(metadata: &fs::Metadata) -> FileKind {
    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        FileKind::Link
    } else if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    }
}

#[cfg(not(unix))]
fn epoch_seconds(time: std::io::Result<std::time::SystemTime>) -> Option<i64> {
    use std::time::UNIX_EPOCH;

    let time = time.ok()?;
    let seconds = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    };
    Some(seconds)
}
