//! SQLite graph store
//!
//! Schema (created by [`SqliteStore::create`]):
//!
//! ```sql
//! CREATE TABLE nodes (id INTEGER PRIMARY KEY ASC, position_x REAL, position_y REAL, position_z REAL);
//! CREATE TABLE edges (id INTEGER PRIMARY KEY ASC, node1 INTEGER NOT NULL, node2 INTEGER NOT NULL, weight REAL);
//! ```
//!
//! Existing stores may omit the `weight` column and may hold NULL positions.

use std::path::{Path, PathBuf};

use rand::RngCore;
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument, warn};

use super::{
    EdgeRecord, GraphSource, GraphStore, NodeRecord, PersistReport, ResultSink, StoreError,
    StoreResult, assemble_graph, check_lengths, fresh_records, to_stored_id,
};
use crate::graph::Graph;
use crate::types::Vec3;

const CREATE_TABLES: &str = "
    CREATE TABLE nodes (
        id INTEGER PRIMARY KEY ASC,
        position_x REAL,
        position_y REAL,
        position_z REAL
    );
    CREATE TABLE edges (
        id INTEGER PRIMARY KEY ASC,
        node1 INTEGER NOT NULL,
        node2 INTEGER NOT NULL,
        weight REAL
    );
";

/// A graph stored in a SQLite file
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect_existing(&self) -> StoreResult<Connection> {
        if !self.path.exists() {
            return Err(StoreError::NotFound(self.path.display().to_string()));
        }
        Ok(Connection::open(&self.path)?)
    }

    fn read_nodes(conn: &Connection) -> StoreResult<Vec<NodeRecord>> {
        let mut stmt =
            conn.prepare("SELECT id, position_x, position_y, position_z FROM nodes ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(NodeRecord {
                id: row.get(0)?,
                x: row.get::<_, Option<f64>>(1)?.map(|v| v as f32),
                y: row.get::<_, Option<f64>>(2)?.map(|v| v as f32),
                z: row.get::<_, Option<f64>>(3)?.map(|v| v as f32),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn has_weight_column(conn: &Connection) -> StoreResult<bool> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('edges')")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for name in names {
            if name?.eq_ignore_ascii_case("weight") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_edges(conn: &Connection) -> StoreResult<Vec<EdgeRecord>> {
        let sql = if Self::has_weight_column(conn)? {
            "SELECT node1, node2, weight FROM edges ORDER BY rowid"
        } else {
            "SELECT node1, node2, NULL FROM edges ORDER BY rowid"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(EdgeRecord {
                node1: row.get(0)?,
                node2: row.get(1)?,
                weight: row.get::<_, Option<f64>>(2)?.map(|w| w as f32),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl GraphSource for SqliteStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load_with(&self, rng: &mut dyn RngCore) -> StoreResult<Graph> {
        let conn = self.connect_existing()?;
        let nodes = Self::read_nodes(&conn)?;
        let edges = Self::read_edges(&conn)?;
        debug!(nodes = nodes.len(), edges = edges.len(), "read sqlite store");
        Ok(assemble_graph(&nodes, &edges, rng))
    }
}

impl ResultSink for SqliteStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn update_positions(&self, node_ids: &[u32], positions: &[Vec3]) -> StoreResult<PersistReport> {
        check_lengths(node_ids, positions)?;
        let mut conn = self.connect_existing()?;
        let mut report = PersistReport::default();

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE nodes SET position_x = ?1, position_y = ?2, position_z = ?3 WHERE id = ?4",
            )?;
            for (&node, position) in node_ids.iter().zip(positions) {
                let id = to_stored_id(node);
                if !position.is_finite() {
                    warn!(id, ?position, "non-finite position, keeping stored value");
                    report.skipped_nan.push(id);
                    continue;
                }
                let changed = stmt.execute(params![
                    f64::from(position.x),
                    f64::from(position.y),
                    f64::from(position.z),
                    id
                ])?;
                report.written += changed;
            }
        }
        tx.commit()?;

        info!(written = report.written, skipped = report.skipped_nan.len(), "updated positions");
        Ok(report)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn create(&self, positions: &[Vec3], edges: &[(u32, u32)]) -> StoreResult<PersistReport> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        let mut conn = Connection::open(&self.path)?;
        conn.execute_batch(CREATE_TABLES)?;

        let (nodes, edges, report) = fresh_records(positions, edges);
        let tx = conn.transaction()?;
        {
            let mut insert_node = tx.prepare(
                "INSERT INTO nodes (id, position_x, position_y, position_z) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for node in &nodes {
                insert_node.execute(params![
                    node.id,
                    node.x.map(f64::from),
                    node.y.map(f64::from),
                    node.z.map(f64::from)
                ])?;
            }

            let mut insert_edge =
                tx.prepare("INSERT INTO edges (node1, node2, weight) VALUES (?1, ?2, ?3)")?;
            for edge in &edges {
                insert_edge.execute(params![edge.node1, edge.node2, edge.weight.map(f64::from)])?;
            }
        }
        tx.commit()?;

        info!(nodes = nodes.len(), edges = edges.len(), "created store");
        Ok(report)
    }
}

impl GraphStore for SqliteStore {
    fn format_id(&self) -> &str {
        "sqlite"
    }
}
