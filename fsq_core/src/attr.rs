//! Named attributes evaluated against nodes.
//!
//! An external query engine looks attributes up by name and calls them with a
//! node and zero or more literal arguments. Each entry is a tagged function
//! pointer so dispatch is a table lookup followed by a direct call.

use crate::error::{Error, Result};
use crate::node::Node;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::process::Command;

/// Token replaced by the rendered node in `exec` commands.
pub const PLACEHOLDER: &str = "{}";

/// Result of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Not applicable to this node.
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl Value {
    /// Anything but absent or `false` counts as a match.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Absent | Value::Bool(false))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => f.write_str(&items.join("\n")),
        }
    }
}

/// A literal argument supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl Literal {
    /// Numbers where they parse, text otherwise.
    pub fn parse(s: &str) -> Self {
        match s.parse::<f64>() {
            Ok(n) => Literal::Number(n),
            Err(_) => Literal::Text(s.to_string()),
        }
    }
}

/// Function shapes an attribute can take.
#[derive(Clone, Copy)]
pub enum Attribute {
    /// No node, no arguments.
    Nullary(fn() -> Value),
    /// A node and the shared owner-name cache.
    Node(fn(&Node, &Owners) -> Value),
    /// A single numeric literal, no node.
    Number(fn(f64) -> Value),
    /// A node plus arbitrary literals.
    NodeWithArgs(fn(&Node, &[Literal]) -> Result<Value>),
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Attribute::Nullary(_) => "Nullary",
            Attribute::Node(_) => "Node",
            Attribute::Number(_) => "Number",
            Attribute::NodeWithArgs(_) => "NodeWithArgs",
        };
        f.write_str(shape)
    }
}

/// Memoized uid/gid to name lookups. Append-only.
#[derive(Debug, Default)]
pub struct Owners {
    users: RefCell<HashMap<u32, Option<String>>>,
    groups: RefCell<HashMap<u32, Option<String>>>,
}

impl Owners {
    pub fn user_name(&self, uid: u32) -> Option<String> {
        self.users
            .borrow_mut()
            .entry(uid)
            .or_insert_with(|| lookup_user(uid))
            .clone()
    }

    pub fn group_name(&self, gid: u32) -> Option<String> {
        self.groups
            .borrow_mut()
            .entry(gid)
            .or_insert_with(|| lookup_group(gid))
            .clone()
    }

    /// Number of cached user and group entries.
    pub fn len(&self) -> usize {
        self.users.borrow().len() + self.groups.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(unix)]
fn lookup_user(uid: u32) -> Option<String> {
    use nix::unistd::{Uid, User};
    User::from_uid(Uid::from_raw(uid)).ok().flatten().map(|u| u.name)
}

#[cfg(unix)]
fn lookup_group(gid: u32) -> Option<String> {
    use nix::unistd::{Gid, Group};
    Group::from_gid(Gid::from_raw(gid)).ok().flatten().map(|g| g.name)
}

#[cfg(not(unix))]
fn lookup_user(_uid: u32) -> Option<String> {
    None
}

#[cfg(not(unix))]
fn lookup_group(_gid: u32) -> Option<String> {
    None
}

/// Every attribute, with its aliases listed separately.
const ATTRIBUTES: &[(&str, Attribute)] = &[
    ("exists", Attribute::Node(exists)),
    ("e", Attribute::Node(exists)),
    ("s", Attribute::Node(size)),
    ("size", Attribute::Node(size)),
    ("empty", Attribute::Node(empty)),
    ("z", Attribute::Node(empty)),
    ("file", Attribute::Node(file)),
    ("f", Attribute::Node(file)),
    ("dir", Attribute::Node(dir)),
    ("d", Attribute::Node(dir)),
    ("link", Attribute::Node(link)),
    ("l", Attribute::Node(link)),
    ("B", Attribute::Node(binary_like)),
    ("bin", Attribute::Node(binary_file)),
    ("T", Attribute::Node(text_like)),
    ("txt", Attribute::Node(text_like)),
    ("text", Attribute::Node(text)),
    ("lines", Attribute::Node(lines)),
    ("r", Attribute::Node(readable)),
    ("w", Attribute::Node(writable)),
    ("x", Attribute::Node(executable)),
    ("oid", Attribute::Node(uid)),
    ("uid", Attribute::Node(uid)),
    ("gid", Attribute::Node(gid)),
    ("user", Attribute::Node(user)),
    ("group", Attribute::Node(group)),
    ("name", Attribute::Node(name)),
    ("encoding", Attribute::Node(encoding)),
    ("enc", Attribute::Node(encoding)),
    ("broken", Attribute::Node(broken)),
    ("path", Attribute::Node(path)),
    ("ext", Attribute::Node(ext)),
    ("mode", Attribute::Node(mode)),
    ("atime", Attribute::Node(atime)),
    ("mtime", Attribute::Node(mtime)),
    ("ctime", Attribute::Node(ctime)),
    ("kb", Attribute::Number(kb)),
    ("mb", Attribute::Number(mb)),
    ("gb", Attribute::Number(gb)),
    ("exec", Attribute::NodeWithArgs(exec)),
    ("me", Attribute::Nullary(me)),
];

/// Name to attribute registry plus the state attributes share.
#[derive(Debug)]
pub struct AttributeTable {
    entries: HashMap<&'static str, Attribute>,
    owners: Owners,
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeTable {
    pub fn new() -> Self {
        Self {
            entries: ATTRIBUTES.iter().copied().collect(),
            owners: Owners::default(),
        }
    }

    /// Look an attribute up by name.
    pub fn get(&self, name: &str) -> Option<Attribute> {
        self.entries.get(name).copied()
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// The shared owner-name cache.
    pub fn owners(&self) -> &Owners {
        &self.owners
    }

    /// Evaluate `name` against an optional node with literal arguments.
    pub fn call(&self, name: &str, node: Option<&Node>, args: &[Literal]) -> Result<Value> {
        let attribute = self.get(name).ok_or_else(|| Error::unknown_attribute(name))?;

        match attribute {
            Attribute::Nullary(f) => {
                expect_no_args(name, args)?;
                Ok(f())
            }
            Attribute::Node(f) => {
                expect_no_args(name, args)?;
                let node = require_node(name, node)?;
                Ok(f(node, &self.owners))
            }
            Attribute::Number(f) => match args {
                [Literal::Number(n)] => Ok(f(*n)),
                _ => Err(Error::invalid_arguments(name, "expected one number")),
            },
            Attribute::NodeWithArgs(f) => f(require_node(name, node)?, args),
        }
    }

    /// Shorthand for attributes that take just a node.
    pub fn eval(&self, name: &str, node: &Node) -> Result<Value> {
        self.call(name, Some(node), &[])
    }
}

fn expect_no_args(name: &str, args: &[Literal]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid_arguments(
            name,
            format!("takes no arguments, got {}", args.len()),
        ))
    }
}

fn require_node<'a>(name: &str, node: Option<&'a Node>) -> Result<&'a Node> {
    node.ok_or_else(|| Error::invalid_arguments(name, "requires a node"))
}

fn exists(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_real())
}

fn size(node: &Node, _: &Owners) -> Value {
    Value::Int(node.size())
}

fn empty(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_empty())
}

fn file(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_file())
}

fn dir(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_directory())
}

fn link(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_link())
}

fn binary_like(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_binary())
}

fn binary_file(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_file() && node.size() > 0 && node.is_binary())
}

fn text_like(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_text())
}

fn text(node: &Node, _: &Owners) -> Value {
    if !node.is_text() {
        return Value::Absent;
    }
    node.text().map_or(Value::Absent, Value::Text)
}

fn lines(node: &Node, _: &Owners) -> Value {
    if !node.is_text() {
        return Value::List(Vec::new());
    }
    Value::List(node.lines())
}

fn readable(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.can_read())
}

fn writable(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.can_write())
}

fn executable(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.can_execute())
}

fn uid(node: &Node, _: &Owners) -> Value {
    Value::Int(node.uid())
}

fn gid(node: &Node, _: &Owners) -> Value {
    Value::Int(node.gid())
}

fn user(node: &Node, owners: &Owners) -> Value {
    node.stat()
        .and_then(|s| owners.user_name(s.uid))
        .map_or(Value::Absent, Value::Text)
}

fn group(node: &Node, owners: &Owners) -> Value {
    node.stat()
        .and_then(|s| owners.group_name(s.gid))
        .map_or(Value::Absent, Value::Text)
}

fn name(node: &Node, _: &Owners) -> Value {
    Value::Text(node.tag().into_owned())
}

fn encoding(node: &Node, _: &Owners) -> Value {
    node.encoding()
        .map_or(Value::Absent, |label| Value::Text(label.to_string()))
}

fn broken(node: &Node, _: &Owners) -> Value {
    Value::Bool(node.is_broken())
}

fn path(node: &Node, _: &Owners) -> Value {
    Value::Text(node.to_string())
}

fn ext(node: &Node, _: &Owners) -> Value {
    node.path()
        .extension()
        .map_or(Value::Absent, |e| Value::Text(e.to_string_lossy().into_owned()))
}

fn mode(node: &Node, _: &Owners) -> Value {
    Value::Int(node.mode())
}

fn atime(node: &Node, _: &Owners) -> Value {
    Value::Int(node.atime())
}

fn mtime(node: &Node, _: &Owners) -> Value {
    Value::Int(node.mtime())
}

fn ctime(node: &Node, _: &Owners) -> Value {
    Value::Int(node.ctime())
}

/// Integral results stay integers; fractional ones become floats.
fn scaled(n: f64, factor: f64) -> Value {
    let value = n * factor;
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Int(value as i64)
    } else {
        Value::Float(value)
    }
}

fn kb(n: f64) -> Value {
    scaled(n, 1024.0)
}

fn mb(n: f64) -> Value {
    scaled(n, 1024.0 * 1024.0)
}

fn gb(n: f64) -> Value {
    scaled(n, 1024.0 * 1024.0 * 1024.0)
}

/// Run a command with every standalone `{}` replaced by the rendered node
/// (its path, or the quoted literal for a non-real node).
///
/// Returns stdout with one trailing newline removed, or absent when the
/// command printed nothing.
fn exec(node: &Node, args: &[Literal]) -> Result<Value> {
    let command = match args {
        [Literal::Text(command)] => command,
        _ => return Err(Error::invalid_arguments("exec", "expected one command string")),
    };

    let target = node.to_string();
    let argv: Vec<String> = shlex::split(command)
        .ok_or_else(|| Error::invalid_arguments("exec", "unbalanced quotes"))?
        .into_iter()
        .map(|arg| {
            if arg == PLACEHOLDER {
                target.clone()
            } else {
                arg
            }
        })
        .collect();

    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| Error::invalid_arguments("exec", "empty command"))?;

    log::debug!("exec {:?}", argv);
    let output = Command::new(program).args(rest).output()?;

    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.ends_with('\n') {
        stdout.pop();
        if stdout.ends_with('\r') {
            stdout.pop();
        }
    }

    if stdout.is_empty() {
        Ok(Value::Absent)
    } else {
        Ok(Value::Text(stdout))
    }
}

#[cfg(unix)]
fn me() -> Value {
    Value::Int(nix::unistd::getuid().as_raw() as i64)
}

#[cfg(not(unix))]
fn me() -> Value {
    Value::Int(crate::stat::UNKNOWN)
}
