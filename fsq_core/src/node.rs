//! Tree nodes with lazily computed, memoized metadata.
//!
//! A [`Node`] owns its children (strong `Rc`s) and refers to its parent
//! through a `Weak`, so a descendant never keeps its ancestors alive. Every
//! expensive value (stat record, child listing, content sniff, encoding) is
//! computed on first access and cached for the node's lifetime.

use crate::encoding::{self, Detector};
use crate::error::{Error, Result};
use crate::sniff::{self, Sniff};
use crate::stat::{StatRecord, UNKNOWN, owner_bits};
use std::borrow::Cow;
use std::cell::OnceCell;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};
use std::rc::{Rc, Weak};

/// Opaque volume/drive identifier. Empty on Unix, the path prefix on Windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Volume(String);

impl Volume {
    pub fn new(id: impl Into<String>) -> Self {
        Volume(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file, directory or unresolved name in a forest.
pub struct Node {
    name: OsString,
    real: bool,
    /// Absolute path for real nodes, the raw literal otherwise.
    path: PathBuf,
    volume: Volume,
    parent: Option<Weak<Node>>,
    self_ref: Weak<Node>,
    detector: Detector,
    children: OnceCell<Vec<Rc<Node>>>,
    stat: OnceCell<Option<StatRecord>>,
    sniff: OnceCell<Option<Sniff>>,
    encoding: OnceCell<Option<String>>,
}

impl Node {
    fn build(
        name: OsString,
        real: bool,
        path: PathBuf,
        volume: Volume,
        parent: Option<Weak<Node>>,
        detector: Detector,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Node {
            name,
            real,
            path,
            volume,
            parent,
            self_ref: me.clone(),
            detector,
            children: OnceCell::new(),
            stat: OnceCell::new(),
            sniff: OnceCell::new(),
            encoding: OnceCell::new(),
        })
    }

    /// Create the root node of `volume`.
    pub fn root(volume: Volume, detector: Detector) -> Rc<Self> {
        let path = PathBuf::from(format!("{}{}", volume, MAIN_SEPARATOR_STR));
        Self::build(
            OsString::from(MAIN_SEPARATOR_STR),
            true,
            path,
            volume,
            None,
            detector,
        )
    }

    /// Create a standalone node for something that does not exist on disk.
    pub fn unreal(name: impl Into<OsString>, detector: Detector) -> Rc<Self> {
        let name = name.into();
        let path = PathBuf::from(&name);
        Self::build(name, false, path, Volume::default(), None, detector)
    }

    /// Create a real child of `parent`.
    fn child(parent: &Node, name: OsString) -> Rc<Self> {
        let path = parent.path.join(&name);
        Self::build(
            name,
            true,
            path,
            parent.volume.clone(),
            Some(parent.self_ref.clone()),
            parent.detector.clone(),
        )
    }

    /// Base name of the entry, or the raw literal for non-real nodes.
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Base name as text, for name matching.
    pub fn tag(&self) -> Cow<'_, str> {
        self.name.to_string_lossy()
    }

    /// Whether this node corresponds to an existing filesystem entry.
    pub fn is_real(&self) -> bool {
        self.real
    }

    /// Absolute path of a real node; the raw literal of a non-real one.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// The encoding detector shared by every node in this tree.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// The parent node, if it has one and something still holds it.
    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// True for nodes created without a parent link (roots and non-real nodes).
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Child nodes in directory enumeration order, listed once.
    ///
    /// Empty for non-real nodes, non-directories and links. Entries that
    /// fail to list are logged and skipped; their siblings are kept.
    pub fn children(&self) -> &[Rc<Node>] {
        self.children.get_or_init(|| {
            if !self.is_directory() {
                return Vec::new();
            }

            let children = self.list_children();
            log::trace!("listed {} children of {}", children.len(), self);
            children
        })
    }

    fn list_children(&self) -> Vec<Rc<Node>> {
        let walker = ignore::WalkBuilder::new(&self.path)
            .max_depth(Some(1)) // Only immediate children
            .standard_filters(false) // Every entry, hidden or ignored
            .follow_links(false)
            .build()
            .map(|entry| entry.map(|e| (e.depth(), e.file_name().to_os_string())));

        entry_names(self, walker)
            .into_iter()
            .map(|name| Node::child(self, name))
            .collect()
    }

    /// The cached stat record, performing the `lstat` on first access.
    ///
    /// `None` for non-real nodes and when the call failed.
    pub fn stat(&self) -> Option<&StatRecord> {
        if !self.real {
            return None;
        }

        self.stat
            .get_or_init(|| match StatRecord::load(&self.path) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::debug!("stat failed for {}: {}", self, e);
                    None
                }
            })
            .as_ref()
    }

    /// True iff the node is real and its stat call failed.
    pub fn is_broken(&self) -> bool {
        self.real && self.stat().is_none()
    }

    pub fn is_file(&self) -> bool {
        self.stat().is_some_and(StatRecord::is_file)
    }

    pub fn is_directory(&self) -> bool {
        self.stat().is_some_and(StatRecord::is_directory)
    }

    pub fn is_link(&self) -> bool {
        self.stat().is_some_and(StatRecord::is_link)
    }

    /// Size in bytes, or -1.
    pub fn size(&self) -> i64 {
        self.stat().map_or(UNKNOWN, |s| s.size as i64)
    }

    /// Real and zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.stat().is_some_and(|s| s.size == 0)
    }

    pub fn uid(&self) -> i64 {
        self.stat().map_or(UNKNOWN, |s| s.uid as i64)
    }

    pub fn gid(&self) -> i64 {
        self.stat().map_or(UNKNOWN, |s| s.gid as i64)
    }

    pub fn mode(&self) -> i64 {
        self.stat().map_or(UNKNOWN, |s| s.mode as i64)
    }

    pub fn inode(&self) -> i64 {
        self.stat().map_or(UNKNOWN, |s| s.inode as i64)
    }

    pub fn device(&self) -> i64 {
        self.stat().map_or(UNKNOWN, |s| s.device as i64)
    }

    pub fn nlink(&self) -> i64 {
        self.stat().map_or(UNKNOWN, |s| s.nlink as i64)
    }

    pub fn atime(&self) -> i64 {
        self.stat().and_then(|s| s.atime).unwrap_or(UNKNOWN)
    }

    pub fn mtime(&self) -> i64 {
        self.stat().and_then(|s| s.mtime).unwrap_or(UNKNOWN)
    }

    pub fn ctime(&self) -> i64 {
        self.stat().and_then(|s| s.ctime).unwrap_or(UNKNOWN)
    }

    pub fn can_read(&self) -> bool {
        self.stat().is_some_and(|s| s.owner_can(owner_bits::READ))
    }

    pub fn can_write(&self) -> bool {
        self.stat().is_some_and(|s| s.owner_can(owner_bits::WRITE))
    }

    pub fn can_execute(&self) -> bool {
        self.stat().is_some_and(|s| s.owner_can(owner_bits::EXECUTE))
    }

    /// Sniff result for readable regular files.
    fn sniff(&self) -> Option<Sniff> {
        *self.sniff.get_or_init(|| {
            if !self.is_file() || !self.can_read() {
                return None;
            }

            match sniff::sniff_file(&self.path) {
                Ok(sniff) => Some(sniff),
                Err(e) => {
                    log::debug!("cannot sniff {}: {}", self, e);
                    None
                }
            }
        })
    }

    /// Binary content, an empty file, or a directory.
    pub fn is_binary(&self) -> bool {
        self.is_directory() || self.sniff().is_some_and(Sniff::is_binary)
    }

    /// Regular file whose content looks like text (empty files included).
    pub fn is_text(&self) -> bool {
        self.sniff().is_some_and(Sniff::is_text)
    }

    fn check_readable(&self) -> Result<()> {
        if !self.is_file() {
            return Err(Error::read(&self.path, "not a regular file"));
        }
        if !self.can_read() {
            return Err(Error::read(&self.path, "permission denied"));
        }
        Ok(())
    }

    /// Raw file content, read fresh on every call.
    pub fn octets(&self) -> Result<Vec<u8>> {
        self.check_readable()?;
        fs::read(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => Error::read(&self.path, "permission denied"),
            _ => Error::from(e),
        })
    }

    /// Decoded file content, read fresh on every call.
    ///
    /// Uses the detected encoding when there is one, UTF-8 otherwise.
    pub fn text(&self) -> Result<String> {
        let bytes = self.octets()?;
        match self.encoding() {
            Some(label) => encoding::decode(&self.path, &bytes, label),
            None => encoding::decode_default(&self.path, bytes),
        }
    }

    /// Lines of [`text`](Self::text) without terminators; empty on failure.
    pub fn lines(&self) -> Vec<String> {
        self.text()
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Detected encoding label for readable text files, memoized.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding
            .get_or_init(|| {
                if !self.is_text() {
                    return None;
                }

                match fs::read(&self.path) {
                    Ok(bytes) => {
                        let guess = self.detector.detect(&bytes);
                        log::trace!("encoding of {}: {:?}", self, guess);
                        guess
                    }
                    Err(e) => {
                        log::debug!("cannot read {} for detection: {}", self, e);
                        None
                    }
                }
            })
            .as_deref()
    }

    /// Path text used for display and equality.
    fn rendered(&self) -> Cow<'_, str> {
        if self.real {
            self.path.to_string_lossy()
        } else {
            Cow::Owned(format!("{:?}", self.name))
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("real", &self.real)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.rendered() == other.rendered()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rendered().hash(state);
    }
}

/// Names of the depth-1 entries of a listing.
///
/// A failed entry is logged and skipped so its siblings still show up.
fn entry_names<E: fmt::Display>(
    dir: &Node,
    entries: impl IntoIterator<Item = std::result::Result<(usize, OsString), E>>,
) -> Vec<OsString> {
    let mut names = Vec::new();
    for entry in entries {
        match entry {
            // Skip the directory itself
            Ok((0, _)) => {}
            Ok((_, name)) => names.push(name),
            Err(e) => log::debug!("skipping entry of {}: {}", dir, e),
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForestConfig;
    use crate::forest::Forest;
    use tempfile::TempDir;

    fn locate(path: &Path, detector: Detector) -> Rc<Node> {
        let forest = Forest::with_config(ForestConfig::with_detector(detector));
        forest.resolve(path).unwrap()
    }

    fn dir_node(temp_dir: &TempDir) -> Rc<Node> {
        locate(temp_dir.path(), Detector::never())
    }

    fn only_child(temp_dir: &TempDir) -> Rc<Node> {
        let dir = dir_node(temp_dir);
        assert_eq!(dir.children().len(), 1);
        dir.children()[0].clone()
    }

    #[test]
    fn test_unreal_node_sentinels() {
        let node = Node::unreal("no/such/thing", Detector::never());
        assert!(!node.is_real());
        assert!(!node.is_file());
        assert!(!node.is_directory());
        assert!(!node.is_link());
        assert!(!node.is_empty());
        assert!(!node.is_text());
        assert!(!node.is_binary());
        assert!(!node.can_read());
        assert!(!node.can_write());
        assert!(!node.can_execute());
        assert!(!node.is_broken());
        assert_eq!(node.size(), -1);
        assert_eq!(node.uid(), -1);
        assert_eq!(node.mtime(), -1);
        assert!(node.children().is_empty());
        assert!(node.encoding().is_none());
        assert!(node.parent().is_none());
    }

    #[test]
    fn test_unreal_node_renders_quoted() {
        let node = Node::unreal("missing.txt", Detector::never());
        assert_eq!(node.to_string(), "\"missing.txt\"");
    }

    #[test]
    fn test_unreal_content_access_fails() {
        let node = Node::unreal("missing.txt", Detector::never());
        assert!(matches!(node.text(), Err(Error::Read { .. })));
        assert!(matches!(node.octets(), Err(Error::Read { .. })));
        assert!(node.lines().is_empty());
    }

    #[test]
    fn test_root_node() {
        let root = Node::root(Volume::default(), Detector::never());
        assert!(root.is_real());
        assert!(root.is_root());
        assert!(root.parent().is_none());
        assert_eq!(root.tag(), MAIN_SEPARATOR_STR);
    }

    #[test]
    fn test_children_listing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.txt"), b"1").unwrap();
        fs::write(temp_dir.path().join(".hidden"), b"2").unwrap();
        fs::write(temp_dir.path().join(".gitignore"), b"one.txt\n").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let dir = dir_node(&temp_dir);
        let mut names: Vec<String> = dir
            .children()
            .iter()
            .map(|c| c.tag().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![".gitignore", ".hidden", "one.txt", "sub"]);

        for child in dir.children() {
            assert_eq!(child.parent().as_deref(), Some(&*dir));
            assert!(child.is_real());
            assert_eq!(child.path(), dir.path().join(child.name()));
            assert_eq!(child.volume(), dir.volume());
        }
    }

    #[test]
    fn test_children_computed_once() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.txt"), b"1").unwrap();

        let dir = dir_node(&temp_dir);
        assert_eq!(dir.children().len(), 1);

        fs::write(temp_dir.path().join("two.txt"), b"2").unwrap();
        assert_eq!(dir.children().len(), 1);
    }

    #[test]
    fn test_failed_entry_keeps_siblings() {
        let temp_dir = TempDir::new().unwrap();
        let dir = dir_node(&temp_dir);
        let entries = vec![
            Ok((0, OsString::from("."))),
            Ok((1, OsString::from("b"))),
            Err("entry vanished"),
            Ok((1, OsString::from("d"))),
        ];
        assert_eq!(entry_names(&dir, entries), vec!["b", "d"]);
    }

    #[test]
    fn test_file_has_no_children() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file.txt"), b"abc").unwrap();

        let file = only_child(&temp_dir);
        assert!(file.is_file());
        assert!(file.children().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_link_not_traversed() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inside.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(&target, temp_dir.path().join("link")).unwrap();

        let dir = dir_node(&temp_dir);
        let link = dir.children().iter().find(|c| c.tag() == "link").unwrap();
        assert!(link.is_link());
        assert!(!link.is_directory());
        assert!(link.children().is_empty());
    }

    #[test]
    fn test_stat_cached_after_first_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("grow.txt");
        fs::write(&path, b"abc").unwrap();

        let file = only_child(&temp_dir);
        assert_eq!(file.size(), 3);

        fs::write(&path, b"abcdef").unwrap();
        assert_eq!(file.size(), 3);
    }

    #[test]
    fn test_broken_when_entry_vanishes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gone.txt");
        fs::write(&path, b"abc").unwrap();

        let file = only_child(&temp_dir);
        fs::remove_file(&path).unwrap();

        assert!(file.is_broken());
        assert!(!file.is_file());
        assert_eq!(file.size(), -1);
    }

    #[test]
    fn test_text_and_lines() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("c.txt"), b"X\r\nY\n").unwrap();

        let file = only_child(&temp_dir);
        assert_eq!(file.text().unwrap(), "X\r\nY\n");
        assert_eq!(file.lines(), vec!["X", "Y"]);
        assert_eq!(file.octets().unwrap(), b"X\r\nY\n");
    }

    #[test]
    fn test_text_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.txt");
        fs::write(&path, b"one").unwrap();

        let file = only_child(&temp_dir);
        assert_eq!(file.text().unwrap(), "one");

        fs::write(&path, b"two").unwrap();
        assert_eq!(file.text().unwrap(), "two");
    }

    #[test]
    fn test_text_on_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dir = dir_node(&temp_dir);
        assert!(matches!(dir.text(), Err(Error::Read { .. })));
        assert!(dir.lines().is_empty());
        assert!(dir.is_binary());
        assert!(!dir.is_text());
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("h"), b"").unwrap();

        let file = only_child(&temp_dir);
        assert!(file.is_empty());
        assert_eq!(file.size(), 0);
        assert!(file.lines().is_empty());
        assert!(file.is_text());
        assert!(file.is_binary());
    }

    #[test]
    fn test_detected_encoding_used_for_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("g.txt");
        fs::write(&path, b"caf\xe9\n").unwrap();

        let file = locate(&path, Detector::new(|_| Some("latin1".to_string())));
        assert_eq!(file.encoding(), Some("latin1"));
        assert_eq!(file.text().unwrap(), "caf\u{e9}\n");
    }

    #[test]
    fn test_undecodable_without_encoding() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("g.txt"), b"caf\xe9\n").unwrap();

        let file = only_child(&temp_dir);
        assert!(file.is_text());
        assert!(file.encoding().is_none());
        assert!(matches!(file.text(), Err(Error::Decode { .. })));
        assert!(file.lines().is_empty());
    }

    #[test]
    fn test_binary_file_is_never_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("b.bin");
        fs::write(&path, [0u8, 159, 146, 150]).unwrap();

        let file = locate(&path, Detector::new(|_| Some("utf-8".to_string())));
        assert!(file.is_binary());
        assert!(!file.is_text());
        assert!(file.encoding().is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_file_is_read_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secret.txt");
        fs::write(&path, b"hidden\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o044)).unwrap();

        let file = locate(&path, Detector::new(|_| Some("utf-8".to_string())));
        assert!(file.is_file());
        assert!(!file.can_read());
        assert!(matches!(file.text(), Err(Error::Read { .. })));
        assert!(matches!(file.octets(), Err(Error::Read { .. })));
        assert!(file.lines().is_empty());
        assert!(!file.is_text());
        assert!(file.encoding().is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_denied_read_is_read_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("f.txt"), b"data").unwrap();

        let file = locate(&sub.join("f.txt"), Detector::never());
        assert!(file.can_read());

        // Stat is cached; the parent now refuses lookups
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o600)).unwrap();
        let result = file.octets();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();

        if nix::unistd::geteuid().is_root() {
            assert_eq!(result.unwrap(), b"data");
        } else {
            assert!(matches!(result, Err(Error::Read { .. })));
        }
    }

    #[test]
    fn test_parent_does_not_outlive_holders() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("leaf.txt"), b"x").unwrap();

        let leaf = only_child(&temp_dir);

        assert!(leaf.parent().is_none());
        assert!(!leaf.is_root());
        assert!(leaf.to_string().ends_with("leaf.txt"));
        assert!(leaf.is_file());
    }

    #[test]
    fn test_equality_by_rendered_path() {
        let temp_dir = TempDir::new().unwrap();

        let first = dir_node(&temp_dir);
        let second = dir_node(&temp_dir);
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(first, second);

        let literal = Node::unreal(first.path().as_os_str(), Detector::never());
        assert_ne!(*first, *literal);
    }
}
