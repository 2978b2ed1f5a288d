//! Root registry and path resolution.

use crate::config::ForestConfig;
use crate::encoding::Detector;
use crate::error::{Error, Result};
use crate::node::{Node, Volume};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

/// Something [`Forest::wrap`] can turn into a node.
#[derive(Debug, Clone)]
pub enum Target {
    /// A path string, absolute or relative to the working directory.
    Path(PathBuf),
    /// An already resolved node, returned unchanged.
    Node(Rc<Node>),
}

impl From<&str> for Target {
    fn from(path: &str) -> Self {
        Target::Path(PathBuf::from(path))
    }
}

impl From<String> for Target {
    fn from(path: String) -> Self {
        Target::Path(PathBuf::from(path))
    }
}

impl From<&Path> for Target {
    fn from(path: &Path) -> Self {
        Target::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Target {
    fn from(path: PathBuf) -> Self {
        Target::Path(path)
    }
}

impl From<Rc<Node>> for Target {
    fn from(node: Rc<Node>) -> Self {
        Target::Node(node)
    }
}

impl From<&Rc<Node>> for Target {
    fn from(node: &Rc<Node>) -> Self {
        Target::Node(Rc::clone(node))
    }
}

/// A tree instance: one root node per volume, built on demand.
///
/// Resolving the same path twice yields the same node object until
/// [`clean`](Self::clean) discards the roots. Nodes handed out before a clean
/// stay usable but are no longer reachable from new resolutions.
#[derive(Debug)]
pub struct Forest {
    roots: RefCell<HashMap<Volume, Rc<Node>>>,
    detector: Detector,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}

impl Forest {
    /// Create a forest with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ForestConfig::default())
    }

    /// Create a forest, resolving the encoding detector once.
    pub fn with_config(config: ForestConfig) -> Self {
        let detector = config.detector.resolve();
        log::debug!("forest using {} encoding detector", detector.name());

        Self {
            roots: RefCell::new(HashMap::new()),
            detector,
        }
    }

    /// The detector shared by every node of this forest.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Turn a path or node into a node.
    pub fn wrap(&self, target: impl Into<Target>) -> Result<Rc<Node>> {
        match target.into() {
            Target::Node(node) => Ok(node),
            Target::Path(path) => self.resolve(&path),
        }
    }

    /// Resolve a path to a node.
    ///
    /// Existing paths are canonicalized and walked from their volume root,
    /// reusing already listed children. Paths that don't exist produce a
    /// standalone non-real node named by the literal path.
    ///
    /// Fails with [`Error::NotFoundInCache`] when an entry is missing from
    /// its parent's cached listing, e.g. because it was created after the
    /// listing. Callers may [`clean`](Self::clean) and retry.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<Rc<Node>> {
        let path = path.as_ref();

        let canonical = match fs::canonicalize(path) {
            Ok(canonical) => canonical,
            Err(e) => {
                log::trace!("{} does not resolve: {}", path.display(), e);
                return Ok(Node::unreal(path.as_os_str(), self.detector.clone()));
            }
        };

        let (volume, names) = split_volume(&canonical);
        let mut node = self.root(&volume);

        for name in names {
            let child = node
                .children()
                .iter()
                .find(|child| child.name() == name.as_os_str())
                .cloned()
                .ok_or_else(|| Error::not_found_in_cache(node.to_string(), name.to_string_lossy()))?;
            node = child;
        }

        Ok(node)
    }

    /// Fetch or create the root node of `volume`.
    pub fn root(&self, volume: &Volume) -> Rc<Node> {
        let mut roots = self.roots.borrow_mut();
        let root = roots.entry(volume.clone()).or_insert_with(|| {
            log::trace!("creating root for volume {:?}", volume.as_str());
            Node::root(volume.clone(), self.detector.clone())
        });
        Rc::clone(root)
    }

    /// Discard every root. Already obtained nodes are left untouched.
    pub fn clean(&self) {
        let dropped = std::mem::take(&mut *self.roots.borrow_mut());
        log::debug!("discarded {} roots", dropped.len());
    }

    /// Alias of [`clean`](Self::clean).
    pub fn invalidate(&self) {
        self.clean();
    }

    /// Number of roots currently materialized.
    pub fn root_count(&self) -> usize {
        self.roots.borrow().len()
    }
}

/// Split a canonical path into its volume and the names below the root.
fn split_volume(path: &Path) -> (Volume, Vec<OsString>) {
    let mut volume = Volume::default();
    let mut names = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                volume = Volume::new(prefix.as_os_str().to_string_lossy());
            }
            Component::Normal(name) => names.push(name.to_os_string()),
            Component::RootDir | Component::CurDir | Component::ParentDir => {}
        }
    }

    (volume, names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn forest() -> Forest {
        Forest::with_config(ForestConfig::with_detector(Detector::never()))
    }

    #[test]
    fn test_resolve_same_path_twice_is_same_node() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"x").unwrap();

        let forest = forest();
        let first = forest.resolve(&path).unwrap();
        let second = forest.resolve(&path).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first, second);
        assert_eq!(forest.root_count(), 1);
    }

    #[test]
    fn test_resolve_reuses_ancestors() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("d")).unwrap();
        fs::write(temp_dir.path().join("d").join("f"), b"x").unwrap();

        let forest = forest();
        let dir = forest.resolve(temp_dir.path().join("d")).unwrap();
        let file = forest.resolve(temp_dir.path().join("d").join("f")).unwrap();

        assert!(Rc::ptr_eq(&file.parent().unwrap(), &dir));
        assert!(dir.children().iter().any(|c| Rc::ptr_eq(c, &file)));
    }

    #[test]
    fn test_resolve_relative_segments() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("d")).unwrap();

        let forest = forest();
        let direct = forest.resolve(temp_dir.path()).unwrap();
        let roundabout = forest
            .resolve(temp_dir.path().join("d").join(".."))
            .unwrap();

        assert!(Rc::ptr_eq(&direct, &roundabout));
    }

    #[test]
    fn test_resolve_working_directory() {
        let forest = forest();
        let dot = forest.resolve(".").unwrap();
        let cwd = forest.resolve(std::env::current_dir().unwrap()).unwrap();
        assert!(Rc::ptr_eq(&dot, &cwd));
        assert!(dot.is_directory());
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_root() {
        let forest = forest();
        let root = forest.resolve("/").unwrap();
        assert!(root.is_real());
        assert!(root.is_root());
        assert!(root.is_directory());
        assert!(Rc::ptr_eq(&root, &forest.root(root.volume())));
    }

    #[test]
    fn test_resolve_nonexistent_is_unreal() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing").join("deeper");

        let forest = forest();
        let node = forest.resolve(&missing).unwrap();

        assert!(!node.is_real());
        assert_eq!(node.name(), missing.as_os_str());
        assert!(node.parent().is_none());
        assert!(node.children().is_empty());
        assert_eq!(forest.root_count(), 0);
    }

    #[test]
    fn test_wrap_node_is_identity() {
        let temp_dir = TempDir::new().unwrap();
        let forest = forest();
        let node = forest.resolve(temp_dir.path()).unwrap();

        let wrapped = forest.wrap(&node).unwrap();
        assert!(Rc::ptr_eq(&node, &wrapped));

        let unreal = forest.wrap("definitely/not/here").unwrap();
        let rewrapped = forest.wrap(unreal.clone()).unwrap();
        assert!(Rc::ptr_eq(&unreal, &rewrapped));
    }

    #[test]
    fn test_wrap_string_paths() {
        let temp_dir = TempDir::new().unwrap();
        let forest = forest();
        let text = temp_dir.path().to_string_lossy().into_owned();

        let from_str = forest.wrap(text.as_str()).unwrap();
        let from_string = forest.wrap(text).unwrap();
        assert!(Rc::ptr_eq(&from_str, &from_string));
    }

    #[test]
    fn test_stale_listing_is_explicit_failure() {
        let temp_dir = TempDir::new().unwrap();
        let forest = forest();

        let dir = forest.resolve(temp_dir.path()).unwrap();
        assert!(dir.children().is_empty());

        let late = temp_dir.path().join("late.txt");
        fs::write(&late, b"x").unwrap();

        let err = forest.resolve(&late).unwrap_err();
        match err {
            Error::NotFoundInCache { parent, name } => {
                assert_eq!(parent, dir.to_string());
                assert_eq!(name, "late.txt");
            }
            other => panic!("unexpected error: {other}"),
        }

        forest.clean();
        let node = forest.resolve(&late).unwrap();
        assert!(node.is_file());
    }

    #[test]
    fn test_clean_rebuilds_equal_nodes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"x").unwrap();

        let forest = forest();
        let before = forest.resolve(&path).unwrap();
        assert_eq!(before.size(), 1);

        forest.invalidate();
        assert_eq!(forest.root_count(), 0);

        let after = forest.resolve(&path).unwrap();
        assert_eq!(before, after);
        assert!(!Rc::ptr_eq(&before, &after));

        // Old node keeps its cached data
        assert_eq!(before.size(), 1);
        assert!(before.is_file());
    }

    #[test]
    fn test_nodes_share_forest_detector() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"x").unwrap();

        let forest = Forest::with_config(ForestConfig::with_detector(Detector::new(|_| {
            Some("utf-8".to_string())
        })));
        let file = forest.resolve(temp_dir.path().join("a.txt")).unwrap();

        assert_eq!(forest.detector().name(), "custom");
        assert_eq!(file.detector().name(), "custom");
        assert_eq!(file.encoding(), Some("utf-8"));
    }

    #[test]
    #[cfg(unix)]
    fn test_split_volume() {
        let (volume, names) = split_volume(Path::new("/a/b/c"));
        assert_eq!(volume, Volume::default());
        assert_eq!(names, vec!["a", "b", "c"]);

        let (_, names) = split_volume(Path::new("/"));
        assert!(names.is_empty());
    }
}
