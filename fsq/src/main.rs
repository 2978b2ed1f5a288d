mod output;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fsq_core::{AttributeTable, DetectorChoice, Forest, ForestConfig, Literal, Node, Value};
use output::{AttrOutput, CatOutput, FindOutput, LsOutput, NodeInfo, OutputWriter, StatOutput};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

/// fsq - Inspect the filesystem through a memoizing node tree
#[derive(Parser)]
#[command(name = "fsq")]
#[command(about = "Inspect files through a lazily built, cached node tree", long_about = None)]
#[command(version)]
struct Cli {
    /// Encoding detector: auto or none (overrides FSQ_DETECTOR and the config file)
    #[arg(long, global = true)]
    detector: Option<String>,

    /// Config file with key=value lines (e.g. detector=none)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log more (repeat for trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node metadata
    Stat {
        /// Path to inspect
        path: PathBuf,
    },

    /// List the children of a directory
    Ls {
        /// Directory to list
        path: PathBuf,

        /// Show kind and size
        #[arg(short, long)]
        long: bool,
    },

    /// Evaluate one attribute
    Attr {
        /// Attribute name (e.g. size, T, bin, kb, exec)
        name: String,

        /// Path of the node (omit for node-less attributes like kb or me)
        path: Option<PathBuf>,

        /// Literal arguments, numbers where they parse
        #[arg(long = "arg")]
        args: Vec<String>,
    },

    /// Walk a subtree and print nodes matching every attribute
    Find {
        /// Directory to walk
        path: PathBuf,

        /// Attributes that must all hold (e.g. --attr f --attr T)
        #[arg(long = "attr", required = true)]
        attrs: Vec<String>,
    },

    /// Print a file's decoded text
    Cat {
        /// File to print
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = OutputWriter::new(cli.json);
    match run(cli, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.write_error(&e, 1);
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ForestConfig::parse(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ForestConfig::default(),
    };

    // Detector precedence: CLI arg > FSQ_DETECTOR env var > config file
    if let Some(detector) = cli
        .detector
        .or_else(|| std::env::var("FSQ_DETECTOR").ok())
    {
        config.detector = DetectorChoice::parse(&detector)
            .with_context(|| format!("Invalid detector: {}", detector))?;
    }

    let forest = Forest::with_config(config);
    let table = AttributeTable::new();

    match cli.command {
        Commands::Stat { path } => cmd_stat(&forest, &table, &path, output),
        Commands::Ls { path, long } => cmd_ls(&forest, &path, long, output),
        Commands::Attr { name, path, args } => {
            cmd_attr(&forest, &table, &name, path.as_deref(), &args, output)
        }
        Commands::Find { path, attrs } => cmd_find(&forest, &table, &path, &attrs, output),
        Commands::Cat { path } => cmd_cat(&forest, &path, output),
    }
}

fn resolve(forest: &Forest, path: &Path) -> Result<Rc<Node>> {
    forest
        .resolve(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))
}

fn format_time(seconds: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|t| t.to_rfc3339())
}

fn cmd_stat(
    forest: &Forest,
    table: &AttributeTable,
    path: &Path,
    output: &OutputWriter,
) -> Result<()> {
    let node = resolve(forest, path)?;

    let text_of = |name: &str| -> Result<Option<String>> {
        Ok(match table.eval(name, &node)? {
            Value::Text(s) => Some(s),
            _ => None,
        })
    };

    let data = StatOutput {
        success: true,
        result_code: 0,
        node: NodeInfo::from(&*node),
        broken: node.is_broken(),
        mode: format!("{:04o}", node.mode().max(0)),
        uid: node.uid(),
        gid: node.gid(),
        user: text_of("user")?,
        group: text_of("group")?,
        inode: node.inode(),
        nlink: node.nlink(),
        modified: node.stat().and_then(|s| s.mtime).and_then(format_time),
        encoding: node.encoding().map(str::to_string),
        text: node.is_text(),
        binary: node.is_binary(),
    };

    output.write(&data, || {
        let mut text = format!("Path: {}\n", data.node.path);
        if !data.node.real {
            text.push_str("Real: no\n");
            return text;
        }
        if data.broken {
            text.push_str("Broken: stat failed\n");
            return text;
        }
        if let Some(kind) = &data.node.kind {
            text.push_str(&format!("Type: {}\n", kind));
        }
        text.push_str(&format!("Size: {} bytes\n", data.node.size));
        text.push_str(&format!("Mode: {}\n", data.mode));
        text.push_str(&format!(
            "Owner: {} ({}) / {} ({})\n",
            data.user.as_deref().unwrap_or("?"),
            data.uid,
            data.group.as_deref().unwrap_or("?"),
            data.gid
        ));
        text.push_str(&format!("Inode: {} (links: {})\n", data.inode, data.nlink));
        if let Some(modified) = &data.modified {
            text.push_str(&format!("Modified: {}\n", modified));
        }
        text.push_str(&format!("Text: {}  Binary: {}\n", data.text, data.binary));
        if let Some(encoding) = &data.encoding {
            text.push_str(&format!("Encoding: {}\n", encoding));
        }
        text
    })
}

fn cmd_ls(forest: &Forest, path: &Path, long: bool, output: &OutputWriter) -> Result<()> {
    let node = resolve(forest, path)?;
    if !node.is_directory() {
        anyhow::bail!("Not a directory: {}", node);
    }

    let mut entries: Vec<NodeInfo> = node
        .children()
        .iter()
        .map(|c| NodeInfo::from(&**c))
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let data = LsOutput {
        success: true,
        result_code: 0,
        path: node.to_string(),
        entries,
    };

    output.write(&data, || {
        let mut text = String::new();
        for entry in &data.entries {
            if long {
                text.push_str(&format!(
                    "{:<5} {:>10} {}\n",
                    entry.kind.as_deref().unwrap_or("?"),
                    entry.size,
                    entry.name
                ));
            } else {
                text.push_str(&format!("{}\n", entry.name));
            }
        }
        text
    })
}

fn cmd_attr(
    forest: &Forest,
    table: &AttributeTable,
    name: &str,
    path: Option<&Path>,
    args: &[String],
    output: &OutputWriter,
) -> Result<()> {
    let node = path.map(|p| resolve(forest, p)).transpose()?;
    let literals: Vec<Literal> = args.iter().map(|a| Literal::parse(a)).collect();

    let value = table
        .call(name, node.as_deref(), &literals)
        .with_context(|| format!("Failed to evaluate {}", name))?;

    let data = AttrOutput {
        success: true,
        result_code: 0,
        attribute: name.to_string(),
        path: node.as_ref().map(|n| n.to_string()),
        value,
    };

    output.write(&data, || match &data.value {
        Value::Absent => String::new(),
        value => format!("{}\n", value),
    })
}

fn cmd_find(
    forest: &Forest,
    table: &AttributeTable,
    path: &Path,
    attrs: &[String],
    output: &OutputWriter,
) -> Result<()> {
    let top = resolve(forest, path)?;

    // Reject unknown names before walking
    for attr in attrs {
        if table.get(attr).is_none() {
            anyhow::bail!("Unknown attribute: {}", attr);
        }
    }

    let mut matches = Vec::new();
    for node in top.walk() {
        let mut all = true;
        for attr in attrs {
            if !table
                .eval(attr, &node)
                .with_context(|| format!("Failed to evaluate {} on {}", attr, node))?
                .is_truthy()
            {
                all = false;
                break;
            }
        }
        if all {
            matches.push(node.to_string());
        }
    }

    let data = FindOutput {
        success: true,
        result_code: 0,
        attributes: attrs.to_vec(),
        matches,
    };

    output.write(&data, || {
        data.matches.iter().map(|m| format!("{}\n", m)).collect()
    })
}

fn cmd_cat(forest: &Forest, path: &Path, output: &OutputWriter) -> Result<()> {
    let node = resolve(forest, path)?;
    let text = node
        .text()
        .with_context(|| format!("Failed to read {}", node))?;

    let data = CatOutput {
        success: true,
        result_code: 0,
        path: node.to_string(),
        encoding: node.encoding().map(str::to_string),
        text,
    };

    output.write(&data, || data.text.clone())
}
