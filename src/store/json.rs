//! JSON graph store
//!
//! The document mirrors the SQLite tables:
//!
//! ```json
//! {
//!   "nodes": [{ "id": 1, "x": 0.0, "y": 0.0, "z": 0.0 }],
//!   "edges": [{ "node1": 1, "node2": 2, "weight": 0.5 }]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{
    EdgeRecord, GraphSource, GraphStore, NodeRecord, PersistReport, ResultSink, StoreError,
    StoreResult, assemble_graph, check_lengths, fresh_records, to_stored_id,
};
use crate::graph::Graph;
use crate::types::Vec3;

/// Serialized form of a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// A graph stored as a JSON document
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StoreResult<GraphDocument> {
        if !self.path.exists() {
            return Err(StoreError::NotFound(self.path.display().to_string()));
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_document(&self, doc: &GraphDocument) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl GraphSource for JsonStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load_with(&self, rng: &mut dyn RngCore) -> StoreResult<Graph> {
        let doc = self.read_document()?;
        debug!(nodes = doc.nodes.len(), edges = doc.edges.len(), "read json store");
        Ok(assemble_graph(&doc.nodes, &doc.edges, rng))
    }
}

impl ResultSink for JsonStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn update_positions(&self, node_ids: &[u32], positions: &[Vec3]) -> StoreResult<PersistReport> {
        check_lengths(node_ids, positions)?;
        let mut doc = self.read_document()?;
        let mut report = PersistReport::default();

        let rows: HashMap<i64, usize> = doc
            .nodes
            .iter()
            .enumerate()
            .map(|(row, node)| (node.id, row))
            .collect();

        for (&node, &position) in node_ids.iter().zip(positions) {
            let id = to_stored_id(node);
            if !position.is_finite() {
                warn!(id, ?position, "non-finite position, keeping stored value");
                report.skipped_nan.push(id);
                continue;
            }
            if let Some(&row) = rows.get(&id) {
                let record = &mut doc.nodes[row];
                record.x = Some(position.x);
                record.y = Some(position.y);
                record.z = Some(position.z);
                report.written += 1;
            }
        }

        self.write_document(&doc)?;
        info!(written = report.written, skipped = report.skipped_nan.len(), "updated positions");
        Ok(report)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn create(&self, positions: &[Vec3], edges: &[(u32, u32)]) -> StoreResult<PersistReport> {
        let (nodes, edges, report) = fresh_records(positions, edges);
        let doc = GraphDocument { nodes, edges };
        self.write_document(&doc)?;
        info!(nodes = doc.nodes.len(), edges = doc.edges.len(), "created store");
        Ok(report)
    }
}

impl GraphStore for JsonStore {
    fn format_id(&self) -> &str {
        "json"
    }
}
