//! # fsq Core
//!
//! A lazily-materialized, memoizing model of the filesystem.
//!
//! Paths are resolved into [`Node`]s that belong to a [`Forest`]. Nodes list
//! their children, stat themselves, sniff their content and detect their
//! encoding only when asked, and remember the answer. An [`AttributeTable`]
//! exposes those answers by name for query engines.
//!
//! ## Features
//!
//! - One node per canonical path per forest; re-resolving returns the same node
//! - Children owned by their parent, parents referenced weakly
//! - Stat, listing and encoding computed at most once per node
//! - Explicit invalidation of the whole forest
//! - Named attributes with fixed arity shapes
//!
//! ## Example
//!
//! ```no_run
//! use fsq_core::{AttributeTable, Forest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let forest = Forest::new();
//! let table = AttributeTable::new();
//!
//! // Resolve a directory and find its binary files
//! let dir = forest.resolve("./my-data")?;
//! for node in dir.walk() {
//!     if table.eval("bin", &node)?.is_truthy() {
//!         println!("{}", node);
//!     }
//! }
//!
//! // Forget everything and start over
//! forest.invalidate();
//! # Ok(())
//! # }
//! ```

mod attr;
mod config;
mod encoding;
mod error;
mod forest;
mod index;
mod node;
mod sniff;
mod stat;
mod walk;

pub use attr::{Attribute, AttributeTable, Literal, Owners, PLACEHOLDER, Value};
pub use config::{DetectorChoice, ForestConfig};
pub use encoding::Detector;
pub use error::{Error, Result};
pub use forest::{Forest, Target};
pub use index::{Index, TreeIndex};
pub use node::{Node, Volume};
pub use sniff::Sniff;
pub use stat::{FileKind, StatRecord, UNKNOWN};
pub use walk::Walk;
