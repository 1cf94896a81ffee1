// crates/flowctl-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Rule Store
// Description: `RuleStore` implementation backed by SQLite, matching the
//   legacy `reglas`/`logs` schema.
// Purpose: Durable desired-state snapshots and audit log for flowctl.
// Dependencies: rusqlite (bundled), serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Every operation opens a short-lived connection, applies pragmas, does its
//! work, and closes. This is a deliberate departure from a persistent
//! writer-thread/batching design: rule reads and audit appends in this
//! system are low-frequency (one poll per `monitor_interval_secs`, one
//! append per programming outcome), so the simplicity of a fresh connection
//! per call outweighs the cost of reopening SQLite each time.
//!
//! `reglas` mirrors the legacy table one column per match field rather than
//! a JSON blob, and `rule_id` is globally unique across the store (not
//! scoped per-dpid) to match [`flowctl_core::RuleId`]'s own uniqueness
//! contract. `logs` carries the same projection (priority, match fields,
//! actions) plus the literal action token and a timestamp, so a log row is
//! a standalone forensic copy rather than a pointer back into `reglas`.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use flowctl_core::codec::decode_rule;
use flowctl_core::codec::encode_actions;
use flowctl_core::codec::RuleRow;
use flowctl_core::interfaces::RuleStoreError;
use flowctl_core::AuditEvent;
use flowctl_core::DatapathId;
use flowctl_core::DesiredState;
use flowctl_core::RuleStore;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::TransactionBehavior;

// ============================================================================
// SECTION: SqliteStoreError
// ============================================================================

/// Error specific to the SQLite-backed store.
#[derive(Debug, thiserror::Error)]
pub enum SqliteStoreError {
    /// The configured database path could not be used.
    #[error("invalid store path {path}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
    /// A SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored row failed to decode into a domain `Rule`.
    #[error("decode error: {0}")]
    Decode(#[from] flowctl_core::codec::DecodeError),
    /// A value could not be serialized to JSON for storage.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<SqliteStoreError> for RuleStoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Decode(decode_err) => Self::Decode(decode_err),
            other => Self::Backend(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: SqliteStoreConfig
// ============================================================================

/// Configuration for [`SqliteRuleStore`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Busy-timeout applied to every connection.
    pub busy_timeout: Duration,
}

impl SqliteStoreConfig {
    /// Creates a configuration for the database file at `path`, with the
    /// default busy timeout of 5 seconds.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout: Duration::from_secs(5) }
    }
}

// ============================================================================
// SECTION: Connection setup
// ============================================================================

fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path must not be empty".to_owned(),
        });
    }
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| SqliteStoreError::InvalidPath {
                path: path.to_path_buf(),
                reason: source.to_string(),
            })?;
        }
    }
    Ok(())
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    validate_store_path(&config.path)?;
    ensure_parent_dir(&config.path)?;
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    let millis = u32::try_from(config.busy_timeout.as_millis()).unwrap_or(u32::MAX);
    conn.busy_timeout(Duration::from_millis(u64::from(millis)))?;
    Ok(())
}

/// Current schema version. Bumped whenever `initialize_schema` changes the
/// table layout in a way existing databases must migrate through.
const SCHEMA_VERSION: i64 = 1;

fn initialize_schema(conn: &Connection) -> Result<(), SqliteStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS store_meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS reglas (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            dpid      INTEGER NOT NULL,
            rule_id   INTEGER NOT NULL UNIQUE,
            priority  INTEGER NOT NULL DEFAULT 1,
            eth_type  INTEGER NOT NULL CHECK (eth_type > 0),
            ip_proto  INTEGER,
            ipv4_src  TEXT,
            ipv4_dst  TEXT,
            tcp_src   INTEGER,
            tcp_dst   INTEGER,
            in_port   INTEGER,
            actions   TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS logs (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            dpid      INTEGER NOT NULL,
            rule_id   INTEGER NOT NULL,
            priority  INTEGER NOT NULL,
            eth_type  INTEGER NOT NULL,
            ip_proto  INTEGER,
            ipv4_src  TEXT,
            ipv4_dst  TEXT,
            tcp_src   INTEGER,
            tcp_dst   INTEGER,
            in_port   INTEGER,
            actions   TEXT NOT NULL,
            action    TEXT NOT NULL CHECK (action IN ('INSTALADA', 'MODIFICADA', 'ELIMINADA')),
            detail    TEXT,
            timestamp INTEGER NOT NULL
        );",
    )?;
    conn.execute(
        "INSERT INTO store_meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO NOTHING",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Creates the `reglas`/`logs`/`store_meta` tables if they do not already
/// exist.
///
/// # Errors
///
/// Returns [`SqliteStoreError`] if the database cannot be opened or the
/// schema statements fail.
pub fn bootstrap_schema(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    let conn = open_connection(config)?;
    initialize_schema(&conn)
}

// ============================================================================
// SECTION: SqliteRuleStore
// ============================================================================

/// A [`RuleStore`] backed by a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteRuleStore {
    /// Connection parameters used to open a fresh connection per operation.
    config: SqliteStoreConfig,
}

impl SqliteRuleStore {
    /// Opens (creating if necessary) the store at `config.path` and
    /// ensures its schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        bootstrap_schema(&config)?;
        Ok(Self { config })
    }

    fn load_desired_state_sync(&self, dpid: DatapathId) -> Result<DesiredState, SqliteStoreError> {
        let mut conn = open_connection(&self.config)?;
        // An exclusive transaction ensures this snapshot cannot observe a
        // partial write from a concurrent editor of `reglas`, matching the
        // legacy monitor's `BEGIN EXCLUSIVE TRANSACTION` read.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
        let mut stmt = tx.prepare(
            "SELECT rule_id, dpid, priority, eth_type, ip_proto, ipv4_src, ipv4_dst,
                    tcp_src, tcp_dst, in_port, actions
             FROM reglas WHERE dpid = ?1",
        )?;
        let rows = stmt.query_map([dpid.get()], row_to_rule_row)?;

        let mut desired = DesiredState::new();
        for row in rows {
            insert_decoded_row(&mut desired, row?);
        }
        drop(stmt);
        tx.commit()?;
        Ok(desired)
    }

    fn load_all_desired_state_sync(&self) -> Result<Vec<(DatapathId, DesiredState)>, SqliteStoreError> {
        let mut conn = open_connection(&self.config)?;
        // Same exclusive-transaction requirement as `load_desired_state_sync`,
        // scoped around both the dpid enumeration query and the per-dpid
        // reads so the whole multi-switch snapshot is internally consistent.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
        let mut dpid_stmt = tx.prepare("SELECT DISTINCT dpid FROM reglas")?;
        let dpids: Vec<u64> = dpid_stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|v| v.map(|raw| raw.cast_unsigned()))
            .collect::<Result<_, _>>()?;
        drop(dpid_stmt);

        let mut stmt = tx.prepare(
            "SELECT rule_id, dpid, priority, eth_type, ip_proto, ipv4_src, ipv4_dst,
                    tcp_src, tcp_dst, in_port, actions
             FROM reglas WHERE dpid = ?1",
        )?;
        let mut out = Vec::with_capacity(dpids.len());
        for raw_dpid in dpids {
            let dpid = DatapathId::new(raw_dpid);
            let rows = stmt.query_map([raw_dpid], row_to_rule_row)?;
            let mut desired = DesiredState::new();
            for row in rows {
                insert_decoded_row(&mut desired, row?);
            }
            out.push((dpid, desired));
        }
        drop(stmt);
        tx.commit()?;
        Ok(out)
    }

    fn append_audit_event_sync(&self, event: &AuditEvent) -> Result<(), SqliteStoreError> {
        let conn = open_connection(&self.config)?;
        let actions = encode_actions(&event.actions)?;
        conn.execute(
            "INSERT INTO logs (
                 dpid, rule_id, priority, eth_type, ip_proto, ipv4_src, ipv4_dst,
                 tcp_src, tcp_dst, in_port, actions, action, detail, timestamp
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            rusqlite::params![
                event.dpid.get(),
                event.rule_id.get(),
                event.priority,
                event.match_spec.eth_type,
                event.match_spec.ip_proto,
                event.match_spec.ipv4_src,
                event.match_spec.ipv4_dst,
                event.match_spec.tcp_src,
                event.match_spec.tcp_dst,
                event.match_spec.in_port,
                actions,
                event.kind.as_log_literal(),
                event.detail,
                event.timestamp_millis,
            ],
        )?;
        Ok(())
    }

    /// Replaces the desired rule set for one switch with `rules`.
    ///
    /// Intended for test fixtures and the CLI's local seeding command, not
    /// for the monitor's read path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on backend failure.
    pub fn replace_rules(
        &self,
        dpid: DatapathId,
        rules: &[flowctl_core::Rule],
    ) -> Result<(), SqliteStoreError> {
        let mut conn = open_connection(&self.config)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM reglas WHERE dpid = ?1", [dpid.get()])?;
        for rule in rules {
            tx.execute(
                "INSERT INTO reglas (
                     dpid, rule_id, priority, eth_type, ip_proto, ipv4_src, ipv4_dst,
                     tcp_src, tcp_dst, in_port, actions
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    dpid.get(),
                    rule.rule_id.get(),
                    rule.priority,
                    rule.match_spec.eth_type,
                    rule.match_spec.ip_proto,
                    rule.match_spec.ipv4_src,
                    rule.match_spec.ipv4_dst,
                    rule.match_spec.tcp_src,
                    rule.match_spec.tcp_dst,
                    rule.match_spec.in_port,
                    encode_actions(&rule.actions)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Decodes one raw row and inserts it into `desired`, or logs and drops it.
///
/// A malformed row (out-of-range rule id, a zero `eth_type`, or an
/// unparseable `actions` shape) must not abort the rest of the snapshot.
/// Per the reconciliation engine's error taxonomy, a `DecodeError` is
/// per-rule: the offending rule is dropped from this pass and every other
/// rule in the same dpid's snapshot still loads.
fn insert_decoded_row(desired: &mut DesiredState, row: RuleRow) {
    let rule_id = row.rule_id;
    match decode_rule(row) {
        Ok(rule) => {
            desired.insert(rule.rule_id, rule);
        }
        Err(err) => {
            tracing::warn!(rule_id, %err, "dropping malformed rule from snapshot");
        }
    }
}

fn row_to_rule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleRow> {
    let rule_id: i64 = row.get(0)?;
    let dpid: i64 = row.get(1)?;
    Ok(RuleRow {
        rule_id: rule_id.cast_unsigned(),
        dpid: dpid.cast_unsigned(),
        priority: row.get(2)?,
        eth_type: row.get(3)?,
        ip_proto: row.get(4)?,
        ipv4_src: row.get(5)?,
        ipv4_dst: row.get(6)?,
        tcp_src: row.get(7)?,
        tcp_dst: row.get(8)?,
        in_port: row.get(9)?,
        actions_json: row.get(10)?,
    })
}

impl RuleStore for SqliteRuleStore {
    async fn load_desired_state(&self, dpid: DatapathId) -> Result<DesiredState, RuleStoreError> {
        self.load_desired_state_sync(dpid).map_err(Into::into)
    }

    async fn load_all_desired_state(&self) -> Result<Vec<(DatapathId, DesiredState)>, RuleStoreError> {
        self.load_all_desired_state_sync().map_err(Into::into)
    }

    async fn append_audit_event(&self, event: &AuditEvent) -> Result<(), RuleStoreError> {
        self.append_audit_event_sync(event).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        missing_docs,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]
    use super::*;
    use flowctl_core::codec::encode_audit;
    use flowctl_core::Action;
    use flowctl_core::AuditKind;
    use flowctl_core::MatchSpec;
    use flowctl_core::Rule;
    use flowctl_core::RuleId;

    fn temp_store() -> (tempfile::TempDir, SqliteRuleStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flowctl.db");
        let store = SqliteRuleStore::open(SqliteStoreConfig::new(path)).expect("opens");
        (dir, store)
    }

    fn sample_rule(rule_id: u64, dpid: DatapathId) -> Rule {
        Rule {
            rule_id: RuleId::from_raw(rule_id).expect("in range"),
            dpid,
            match_spec: MatchSpec { eth_type: Some(0x0800), ..MatchSpec::default() },
            priority: 5,
            actions: vec![Action::Drop],
        }
    }

    #[tokio::test]
    async fn empty_store_has_no_desired_state() {
        let (_dir, store) = temp_store();
        let desired = store.load_desired_state(DatapathId::new(1)).await.expect("loads");
        assert!(desired.is_empty());
    }

    #[tokio::test]
    async fn replace_rules_then_load_roundtrips() {
        let (_dir, store) = temp_store();
        let dpid = DatapathId::new(1);
        let rule = sample_rule(1, dpid);
        store.replace_rules(dpid, std::slice::from_ref(&rule)).expect("writes");

        let desired = store.load_desired_state(dpid).await.expect("loads");
        assert_eq!(desired.get(&rule.rule_id), Some(&rule));
    }

    #[tokio::test]
    async fn load_all_desired_state_covers_every_dpid() {
        let (_dir, store) = temp_store();
        let rule_a = sample_rule(1, DatapathId::new(1));
        let rule_b = sample_rule(2, DatapathId::new(2));
        store.replace_rules(rule_a.dpid, std::slice::from_ref(&rule_a)).expect("writes a");
        store.replace_rules(rule_b.dpid, std::slice::from_ref(&rule_b)).expect("writes b");

        let all = store.load_all_desired_state().await.expect("loads");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn append_audit_event_persists_full_projection() {
        let (_dir, store) = temp_store();
        let rule = sample_rule(1, DatapathId::new(1));
        let event = encode_audit(&rule, AuditKind::Installed, 1000, None);
        store.append_audit_event(&event).await.expect("appends");

        let conn = open_connection(&store.config).expect("opens");
        let (action, eth_type): (String, u16) = conn
            .query_row("SELECT action, eth_type FROM logs", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("reads row");
        assert_eq!(action, "INSTALADA");
        assert_eq!(eth_type, 0x0800);
    }

    #[tokio::test]
    async fn malformed_row_is_dropped_without_failing_the_rest_of_the_snapshot() {
        let (_dir, store) = temp_store();
        let dpid = DatapathId::new(1);
        let good = sample_rule(1, dpid);
        store.replace_rules(dpid, std::slice::from_ref(&good)).expect("writes");

        // Insert a row directly that the codec rejects (rule_id 0 is out of
        // range) but that satisfies the `reglas` schema's own constraints,
        // simulating a row written by something other than `replace_rules`.
        let conn = open_connection(&store.config).expect("opens");
        conn.execute(
            "INSERT INTO reglas (dpid, rule_id, priority, eth_type, actions) VALUES (?1, 0, 1, 2048, '[]')",
            [dpid.get()],
        )
        .expect("inserts malformed row");

        let desired = store.load_desired_state(dpid).await.expect("loads despite malformed row");
        assert_eq!(desired.len(), 1);
        assert_eq!(desired.get(&good.rule_id), Some(&good));
    }

    #[test]
    fn replace_rules_rejects_duplicate_rule_id_across_dpids() {
        let (_dir, store) = temp_store();
        let rule_a = sample_rule(1, DatapathId::new(1));
        let mut rule_b = sample_rule(1, DatapathId::new(2));
        rule_b.rule_id = rule_a.rule_id;
        store.replace_rules(rule_a.dpid, std::slice::from_ref(&rule_a)).expect("writes a");

        let err = store.replace_rules(rule_b.dpid, std::slice::from_ref(&rule_b));
        assert!(err.is_err());
    }
}
