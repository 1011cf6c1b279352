//! Trellis CLI — inspect and edit a tag database.
//!
//! Usage:
//!   trellis tree [--db path]
//!   trellis check [--db path]
//!   trellis create <name> [--under <parent-name>]
//!   trellis move <name> --under <parent-name> [--at index]
//!   trellis imply <name> <target-name>
//!   trellis delete <name>
//!   trellis merge <source-name> <target-name>

use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use trellis::{
    ChannelSink, GraphConfig, OpenStore, SqliteStore, TagEvent, TagGraph, TagId,
};

#[derive(Parser)]
#[command(
    name = "trellis",
    version,
    about = "Tag graph engine: hierarchical tags with implication edges"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tag hierarchy
    Tree,
    /// Walk every tag and report cycle/depth diagnostics
    Check,
    /// Create a tag under the root, or under --under
    Create {
        /// Name for the new tag
        name: String,
        /// Name of the parent tag
        #[arg(long)]
        under: Option<String>,
    },
    /// Move a tag under a new parent
    Move {
        /// Name of the tag to move
        name: String,
        /// Name of the new parent
        #[arg(long)]
        under: String,
        /// Child position to splice into (clamped; default: end)
        #[arg(long)]
        at: Option<usize>,
    },
    /// Record that one tag implies another
    Imply {
        /// Name of the implying tag
        name: String,
        /// Name of the implied tag
        target: String,
    },
    /// Delete a tag and its whole subtree
    Delete {
        /// Name of the tag to delete
        name: String,
    },
    /// Merge a leaf tag into another tag
    Merge {
        /// Name of the tag that disappears
        source: String,
        /// Name of the tag that receives its files
        target: String,
    },
}

/// Get the default database path (~/.local/share/trellis/trellis.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let trellis_dir = data_dir.join("trellis");
    std::fs::create_dir_all(&trellis_dir).ok();
    trellis_dir.join("trellis.db")
}

/// Find a tag by name, returning its id. Names are not unique; the first
/// match in depth-first order wins.
fn find_by_name(graph: &TagGraph, name: &str) -> Option<TagId> {
    graph
        .tag_list()
        .iter()
        .find(|id| graph.tag(id).map(|t| t.name == name).unwrap_or(false))
        .cloned()
}

fn require(graph: &TagGraph, name: &str) -> Result<TagId, i32> {
    find_by_name(graph, name).ok_or_else(|| {
        eprintln!("Error: tag '{}' not found", name);
        1
    })
}

fn cmd_tree(graph: &TagGraph) -> i32 {
    if graph.is_empty() {
        println!("No tags defined.");
        return 0;
    }
    for id in graph.tag_list() {
        let Some(tag) = graph.tag(id) else { continue };
        let depth = graph.get_ancestors(id).len();
        let mut line = format!("{}{}", "  ".repeat(depth), tag.name);
        if !tag.implied_tags.is_empty() {
            let implied: Vec<&str> = tag
                .implied_tags
                .iter()
                .filter_map(|t| graph.tag(t).map(|t| t.name.as_str()))
                .collect();
            line.push_str(&format!("  -> {}", implied.join(", ")));
        }
        if tag.is_hidden {
            line.push_str("  (hidden)");
        }
        println!("{}", line);
    }
    0
}

fn cmd_check(graph: &TagGraph, rx: &mut UnboundedReceiver<TagEvent>) -> i32 {
    let ids: Vec<TagId> = graph.tags().map(|t| t.id.clone()).collect();
    for id in &ids {
        let _ = graph.get_ancestors(id);
        let _ = graph.get_sub_tree(id);
    }

    let mut seen = HashSet::new();
    let mut problems = 0;
    while let Ok(event) = rx.try_recv() {
        if let TagEvent::Warning(warning) = event {
            if seen.insert(format!("{}", warning)) {
                eprintln!("warning: {}", warning);
                problems += 1;
            }
        }
    }
    if problems == 0 {
        println!("ok: {} tags, no structural problems", graph.len());
        0
    } else {
        eprintln!("{} problem(s) found", problems);
        1
    }
}

fn cmd_create(graph: &mut TagGraph, name: &str, under: Option<&str>) -> i32 {
    let parent = match under {
        Some(parent_name) => match require(graph, parent_name) {
            Ok(id) => id,
            Err(code) => return code,
        },
        None => graph.root_id().clone(),
    };
    match graph.create(&parent, name) {
        Ok(id) => {
            println!("Created tag '{}' ({})", name, id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_move(graph: &mut TagGraph, name: &str, under: &str, at: Option<usize>) -> i32 {
    let (tag, parent) = match (require(graph, name), require(graph, under)) {
        (Ok(tag), Ok(parent)) => (tag, parent),
        (Err(code), _) | (_, Err(code)) => return code,
    };
    if graph.insert_sub_tag(&parent, &tag, at.unwrap_or(usize::MAX)) {
        println!("Moved '{}' under '{}'", name, under);
        0
    } else {
        eprintln!(
            "Error: cannot move '{}' under '{}': the move would break the hierarchy",
            name, under
        );
        1
    }
}

fn cmd_imply(graph: &mut TagGraph, name: &str, target: &str) -> i32 {
    let (tag, implied) = match (require(graph, name), require(graph, target)) {
        (Ok(tag), Ok(implied)) => (tag, implied),
        (Err(code), _) | (_, Err(code)) => return code,
    };
    if graph.add_implied_tag(&tag, &implied) {
        println!("'{}' now implies '{}'", name, target);
        0
    } else {
        eprintln!(
            "Error: cannot make '{}' imply '{}': the edge is redundant or would close a cycle",
            name, target
        );
        1
    }
}

fn cmd_delete(graph: &mut TagGraph, name: &str) -> i32 {
    let tag = match require(graph, name) {
        Ok(id) => id,
        Err(code) => return code,
    };
    let count = graph.get_sub_tree(&tag).len();
    match graph.delete(&tag) {
        Ok(()) => {
            println!("Deleted '{}' ({} tag(s))", name, count);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_merge(graph: &mut TagGraph, source: &str, target: &str) -> i32 {
    let (source_id, target_id) = match (require(graph, source), require(graph, target)) {
        (Ok(s), Ok(t)) => (s, t),
        (Err(code), _) | (_, Err(code)) => return code,
    };
    match graph.merge(&source_id, &target_id) {
        Ok(()) => {
            println!("Merged '{}' into '{}'", source, target);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let store = match SqliteStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error: cannot open database: {}", e);
            std::process::exit(1);
        }
    };
    let (sink, mut rx) = ChannelSink::new();
    let mut graph = match TagGraph::load(GraphConfig::default(), store, Arc::new(sink)).await {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("Error: failed to load tags: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Tree => cmd_tree(&graph),
        Commands::Check => cmd_check(&graph, &mut rx),
        Commands::Create { name, under } => cmd_create(&mut graph, &name, under.as_deref()),
        Commands::Move { name, under, at } => cmd_move(&mut graph, &name, &under, at),
        Commands::Imply { name, target } => cmd_imply(&mut graph, &name, &target),
        Commands::Delete { name } => cmd_delete(&mut graph, &name),
        Commands::Merge { source, target } => cmd_merge(&mut graph, &source, &target),
    };

    graph.bridge().flush().await;
    std::process::exit(code);
}
