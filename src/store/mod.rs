//! Graph sources and result sinks
//!
//! A store supplies the graph to lay out and receives the final positions.
//! Two backends share one row model: [`SqliteStore`] (`nodes` and `edges`
//! tables) and [`JsonStore`] (the same rows as a JSON document). Stored ids
//! are 1-based; they are shifted to 0-based node ids on load and back on
//! write.

mod json;
mod sqlite;

use std::path::Path;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::Graph;
use crate::types::Vec3;

pub use json::{GraphDocument, JsonStore};
pub use sqlite::SqliteStore;

/// Errors that can occur while loading or persisting a graph
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store file does not exist
    #[error("store not found: {0}")]
    NotFound(String),

    /// The file extension does not name a supported store
    #[error("unsupported store format: {0}")]
    UnsupportedFormat(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Positions and node ids disagree in length
    #[error("expected {expected} positions, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A stored node row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// 1-based stored id
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl NodeRecord {
    fn at(id: i64, position: Vec3) -> Self {
        Self {
            id,
            x: Some(position.x),
            y: Some(position.y),
            z: Some(position.z),
        }
    }
}

/// A stored undirected edge row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// 1-based id of one endpoint
    pub node1: i64,
    /// 1-based id of the other endpoint
    pub node2: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
}

/// Outcome of writing positions to a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistReport {
    /// Nodes whose position was written
    pub written: usize,
    /// Stored ids left untouched because their position was NaN or infinite
    pub skipped_nan: Vec<i64>,
}

/// Supplies a graph to lay out
pub trait GraphSource {
    /// Load the graph, filling missing coordinates from `rng` in `[0, 1)`
    fn load_with(&self, rng: &mut dyn RngCore) -> StoreResult<Graph>;

    /// Load the graph using the thread-local RNG for missing coordinates
    fn load(&self) -> StoreResult<Graph> {
        self.load_with(&mut rand::thread_rng())
    }
}

/// Receives layout results
pub trait ResultSink {
    /// Overwrite the stored positions of existing nodes.
    ///
    /// `node_ids` are 0-based node ids parallel to `positions`. Nodes whose
    /// position is not finite keep their stored value.
    fn update_positions(&self, node_ids: &[u32], positions: &[Vec3]) -> StoreResult<PersistReport>;

    /// Replace the store with fresh node and edge tables.
    ///
    /// Node `i` of `positions` is stored with id `i + 1`; `edges` are 0-based
    /// node id pairs.
    fn create(&self, positions: &[Vec3], edges: &[(u32, u32)]) -> StoreResult<PersistReport>;
}

/// A store that is both a source and a sink
pub trait GraphStore: GraphSource + ResultSink {
    /// Identifier for this store format (e.g. "sqlite", "json")
    fn format_id(&self) -> &str;
}

/// Open the store for `path`, chosen by file extension.
///
/// `.json` selects [`JsonStore`]; `.db`, `.sqlite`, `.sqlite3`, `.db3` or no
/// extension select [`SqliteStore`].
pub fn open(path: &Path) -> StoreResult<Box<dyn GraphStore>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => Ok(Box::new(JsonStore::new(path))),
        None | Some("db" | "sqlite" | "sqlite3" | "db3") => Ok(Box::new(SqliteStore::new(path))),
        Some(other) => Err(StoreError::UnsupportedFormat(other.to_string())),
    }
}

/// Stored 1-based id → 0-based node id
pub(crate) fn to_node_id(stored: i64) -> Option<u32> {
    u32::try_from(stored.checked_sub(1)?).ok()
}

/// 0-based node id → stored 1-based id
pub(crate) fn to_stored_id(node: u32) -> i64 {
    i64::from(node) + 1
}

/// Build a graph from stored rows.
///
/// Rows with ids that cannot be shifted to a node id are skipped. Every edge
/// is added to both endpoints.
pub(crate) fn assemble_graph(
    nodes: &[NodeRecord],
    edges: &[EdgeRecord],
    rng: &mut dyn RngCore,
) -> Graph {
    let mut graph = Graph::with_capacity(nodes.len());
    let mut filled = 0usize;

    for record in nodes {
        let Some(id) = to_node_id(record.id) else {
            warn!(id = record.id, "skipping node with out-of-range id");
            continue;
        };
        let mut axis = |value: Option<f32>| {
            value.unwrap_or_else(|| {
                filled += 1;
                rng.r#gen::<f32>()
            })
        };
        let position = Vec3::new(axis(record.x), axis(record.y), axis(record.z));
        graph.add_node(id, position);
    }

    for record in edges {
        let (Some(a), Some(b)) = (to_node_id(record.node1), to_node_id(record.node2)) else {
            warn!(node1 = record.node1, node2 = record.node2, "skipping edge with out-of-range id");
            continue;
        };
        match record.weight {
            Some(weight) => graph.add_weighted_edge(a, b, weight),
            None => graph.add_edge(a, b),
        };
    }

    if filled > 0 {
        debug!(filled, "filled missing coordinates with random values");
    }
    graph
}

/// Rows for a fresh store, skipping non-finite positions
pub(crate) fn fresh_records(
    positions: &[Vec3],
    edges: &[(u32, u32)],
) -> (Vec<NodeRecord>, Vec<EdgeRecord>, PersistReport) {
    let mut report = PersistReport::default();
    let mut nodes = Vec::with_capacity(positions.len());
    for (i, &position) in positions.iter().enumerate() {
        let id = to_stored_id(i as u32);
        if !position.is_finite() {
            warn!(id, ?position, "non-finite position, node not written");
            report.skipped_nan.push(id);
            continue;
        }
        nodes.push(NodeRecord::at(id, position));
        report.written += 1;
    }
    let edges = edges
        .iter()
        .map(|&(a, b)| EdgeRecord {
            node1: to_stored_id(a),
            node2: to_stored_id(b),
            weight: None,
        })
        .collect();
    (nodes, edges, report)
}

fn check_lengths(node_ids: &[u32], positions: &[Vec3]) -> StoreResult<()> {
    if node_ids.len() != positions.len() {
        return Err(StoreError::LengthMismatch {
            expected: node_ids.len(),
            actual: positions.len(),
        });
    }
    Ok(())
}
