//! SQLite-backed selection provider.
//!
//! Reads the `paths`, `chi_data` and `atoms` tables written by the path
//! database builder. The schema is consumed as-is; this module never creates
//! or migrates tables.

use super::blob::decode_f64_blob;
use crate::domain::{
    ChiError, ChiResult, GroupKey, GroupedSelection, PathId, PathQuery, PathRecord,
    ProviderResult, RawSignal,
};
use crate::modules::{PathCatalog, SelectionProvider};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Ids per `IN (...)` list; keeps every statement well below SQLite's
/// bound-parameter limit.
pub const ID_CHUNK_SIZE: usize = 500;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` since 3.32.
pub const MAX_BOUND_PARAMETERS: usize = 32_766;

/// SQLite's default `SQLITE_MAX_COMPOUND_SELECT`.
pub const MAX_UNION_QUERIES: usize = 500;

const PATH_COLUMNS: &str = "p.id, p.frame, p.atom_id, p.path_num, p.nleg, p.deg, p.reff, \
                            p.path_type, p.atom_sequence";

/// Location of a path database. Connections are opened per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChiDatabase {
    path: PathBuf,
}

impl ChiDatabase {
    pub fn open(path: impl AsRef<Path>) -> ChiResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ChiError::provider(
                "PROVIDER.DATABASE_NOT_FOUND",
                format!("database not found: '{}'", path.display()),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a read-only session; the connection closes when the session drops.
    pub fn session(&self) -> ChiResult<SqliteProvider> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| {
            ChiError::provider(
                "PROVIDER.CONNECT",
                format!("failed to open '{}': {}", self.path.display(), source),
            )
        })?;
        tracing::debug!(path = %self.path.display(), "opened database session");
        Ok(SqliteProvider::from_connection(conn))
    }

    /// Runs `f` with a session that is released afterwards, also on error.
    pub fn with_session<T, F>(&self, f: F) -> ChiResult<T>
    where
        F: FnOnce(&SqliteProvider) -> ChiResult<T>,
    {
        let session = self.session()?;
        f(&session)
    }
}

pub struct SqliteProvider {
    conn: Connection,
}

impl SqliteProvider {
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn grouped_from_sql(&self, sql: &str, params: &[Value]) -> ProviderResult<GroupedSelection> {
        tracing::debug!(sql = %sql, params = params.len(), "resolving grouped selection");
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((
                GroupKey::new(row.get(0)?, row.get(1)?),
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut grouped = GroupedSelection::new();
        for row in rows {
            let (key, concatenated) = row?;
            let ids = grouped.entry(key).or_default();
            for token in concatenated.split(',') {
                let id = token.trim().parse::<i64>().map_err(|source| {
                    ChiError::provider(
                        "PROVIDER.GROUP_IDS",
                        format!("invalid path id '{token}' in group {key}: {source}"),
                    )
                })?;
                ids.insert(PathId(id));
            }
        }
        Ok(grouped)
    }
}

impl SelectionProvider for SqliteProvider {
    fn resolve_flat(&self, query: &PathQuery) -> ProviderResult<Vec<(PathId, GroupKey)>> {
        let (clause, params) = criteria_clause(query);
        let sql = format!(
            "SELECT p.id, p.frame, p.atom_id FROM paths p WHERE 1=1{clause} \
             ORDER BY p.frame, p.atom_id, p.path_num"
        );
        tracing::debug!(sql = %sql, params = params.len(), "resolving flat selection");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((
                PathId(row.get(0)?),
                GroupKey::new(row.get(1)?, row.get(2)?),
            ))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn group_keys(&self, ids: &[PathId]) -> ProviderResult<HashMap<PathId, GroupKey>> {
        let mut keys = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let sql = format!(
                "SELECT p.id, p.frame, p.atom_id FROM paths p WHERE p.id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|id| id.get())), |row| {
                Ok((
                    PathId(row.get(0)?),
                    GroupKey::new(row.get(1)?, row.get(2)?),
                ))
            })?;
            for row in rows {
                let (id, key) = row?;
                keys.insert(id, key);
            }
        }
        Ok(keys)
    }

    fn fetch_signals(&self, ids: &[PathId]) -> ProviderResult<BTreeMap<PathId, RawSignal>> {
        let mut signals = BTreeMap::new();
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let sql = format!(
                "SELECT path_id, k_grid, chi_values FROM chi_data WHERE path_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|id| id.get())), |row| {
                Ok((
                    PathId(row.get(0)?),
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?;

            for row in rows {
                let (id, k_bytes, chi_bytes) = row?;
                let decode = |bytes: &[u8], column: &str| {
                    decode_f64_blob(bytes).map_err(|source| {
                        ChiError::provider(
                            "PROVIDER.BLOB",
                            format!("path {id}: column '{column}': {source}"),
                        )
                    })
                };
                let signal = RawSignal::new(
                    id,
                    decode(&k_bytes, "k_grid")?,
                    decode(&chi_bytes, "chi_values")?,
                );
                signals.insert(id, signal);
            }
        }
        Ok(signals)
    }

    fn resolve_grouped(&self, query: &PathQuery) -> ProviderResult<GroupedSelection> {
        let (clause, params) = criteria_clause(query);
        let sql = format!(
            "SELECT p.frame, p.atom_id, GROUP_CONCAT(p.id) AS path_ids FROM paths p \
             WHERE 1=1{clause} GROUP BY p.frame, p.atom_id"
        );
        self.grouped_from_sql(&sql, &params)
    }

    fn resolve_grouped_union(&self, queries: &[PathQuery]) -> ProviderResult<GroupedSelection> {
        if queries.is_empty() {
            return Ok(GroupedSelection::new());
        }
        // One compound statement: it cannot be chunked without losing UNION dedup.
        if queries.len() > MAX_UNION_QUERIES {
            return Err(ChiError::input_validation(
                "INPUT.UNION_QUERIES",
                format!(
                    "union of {} criteria sets exceeds the limit of {MAX_UNION_QUERIES}",
                    queries.len()
                ),
            ));
        }

        let mut parts = Vec::with_capacity(queries.len());
        let mut all_params = Vec::new();
        for query in queries {
            let (clause, params) = criteria_clause(query);
            parts.push(format!(
                "SELECT p.frame, p.atom_id, p.id FROM paths p WHERE 1=1{clause}"
            ));
            all_params.extend(params);
        }
        if all_params.len() > MAX_BOUND_PARAMETERS {
            return Err(ChiError::input_validation(
                "INPUT.UNION_PARAMETERS",
                format!(
                    "union binds {} parameters, SQLite accepts at most {MAX_BOUND_PARAMETERS}",
                    all_params.len()
                ),
            ));
        }

        // UNION (not UNION ALL) removes paths matched by more than one query.
        let sql = format!(
            "SELECT frame, atom_id, GROUP_CONCAT(id) AS path_ids FROM ({}) AS combined_paths \
             GROUP BY frame, atom_id",
            parts.join(" UNION ")
        );
        self.grouped_from_sql(&sql, &all_params)
    }
}

impl PathCatalog for SqliteProvider {
    fn query_paths(&self, query: &PathQuery) -> ProviderResult<Vec<PathRecord>> {
        let (clause, params) = criteria_clause(query);
        let sql = format!(
            "SELECT {PATH_COLUMNS} FROM paths p WHERE 1=1{clause} \
             ORDER BY p.frame, p.atom_id, p.path_num"
        );
        tracing::debug!(sql = %sql, params = params.len(), "querying path records");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((
                PathRecord {
                    id: PathId(row.get(0)?),
                    frame: row.get(1)?,
                    atom_id: row.get(2)?,
                    path_num: row.get(3)?,
                    nleg: row.get(4)?,
                    degeneracy: row.get(5)?,
                    reff: row.get(6)?,
                    path_type: row.get(7)?,
                    atom_sequence: Vec::new(),
                },
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, atom_sequence) = row?;
            record.atom_sequence = serde_json::from_str(&atom_sequence).map_err(|source| {
                ChiError::provider(
                    "PROVIDER.ATOM_SEQUENCE",
                    format!("path {}: invalid atom_sequence JSON: {}", record.id, source),
                )
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn unique_path_types(&self) -> ProviderResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT path_type FROM paths ORDER BY path_type")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn reff_range(&self) -> ProviderResult<(f64, f64)> {
        let (min, max): (Option<f64>, Option<f64>) = self.conn.query_row(
            "SELECT MIN(reff), MAX(reff) FROM paths",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((min.unwrap_or(0.0), max.unwrap_or(0.0)))
    }

    fn frame_atom_counts(&self) -> ProviderResult<BTreeMap<i64, usize>> {
        let mut stmt = self.conn.prepare(
            "SELECT frame, COUNT(DISTINCT atom_id) AS atom_count FROM atoms \
             GROUP BY frame ORDER BY frame",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (frame, count) = row?;
            counts.insert(frame, usize::try_from(count).unwrap_or(0));
        }
        Ok(counts)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// `AND ...` filter fragment for `paths p` plus its positional parameters.
fn criteria_clause(query: &PathQuery) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut params = Vec::new();

    if !query.path_types.is_empty() {
        sql.push_str(&format!(
            " AND p.path_type IN ({})",
            placeholders(query.path_types.len())
        ));
        params.extend(query.path_types.iter().cloned().map(Value::Text));
    }
    if let Some(min_reff) = query.min_reff {
        sql.push_str(" AND p.reff >= ?");
        params.push(Value::Real(min_reff));
    }
    if let Some(max_reff) = query.max_reff {
        sql.push_str(" AND p.reff <= ?");
        params.push(Value::Real(max_reff));
    }
    if !query.frames.is_empty() {
        sql.push_str(&format!(" AND p.frame IN ({})", placeholders(query.frames.len())));
        params.extend(query.frames.iter().copied().map(Value::Integer));
    }
    if !query.atom_ids.is_empty() {
        sql.push_str(&format!(
            " AND p.atom_id IN ({})",
            placeholders(query.atom_ids.len())
        ));
        params.extend(query.atom_ids.iter().copied().map(Value::Integer));
    }
    if let Some(nleg) = query.nleg {
        sql.push_str(" AND p.nleg = ?");
        params.push(Value::Integer(nleg));
    }

    (sql, params)
}
