use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use rkpd_pki::{leaf_not_before, CertificateChain};
use rusqlite::{
    params, types::Type, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use time::OffsetDateTime;

use super::KeyStore;
use crate::{
    error::{Result, StoreError},
    model::{
        from_millis, to_millis, BadCertTimeRange, BadCertWindowRecord, KeyAssignment,
        ProvisionedKey, PurgeOutcome,
    },
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS provisioned_keys (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        key_blob          BLOB    NOT NULL UNIQUE,
        component         TEXT    NOT NULL,
        public_key        BLOB    NOT NULL,
        certificate_chain BLOB    NOT NULL,
        expiration_time   INTEGER NOT NULL,
        client_uid        INTEGER,
        irpc_uid          INTEGER,
        assigned_at       INTEGER,
        CHECK ((client_uid IS NULL) = (irpc_uid IS NULL)),
        CHECK ((client_uid IS NULL) = (assigned_at IS NULL))
    );
    CREATE INDEX IF NOT EXISTS provisioned_keys_assignment_idx
        ON provisioned_keys (component, client_uid, irpc_uid);
    CREATE TABLE IF NOT EXISTS bad_cert_window (
        id         INTEGER PRIMARY KEY CHECK (id = 1),
        start_time INTEGER NOT NULL,
        end_time   INTEGER NOT NULL,
        version    INTEGER NOT NULL
    );
";

const KEY_COLUMNS: &str = "id, key_blob, component, public_key, certificate_chain, \
                           expiration_time, client_uid, irpc_uid, assigned_at";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed provisioned key store.
///
/// In-process callers are serialised by the connection mutex. Other
/// processes opening the same file are serialised by SQLite itself: every
/// read-modify-write runs in a `BEGIN IMMEDIATE` transaction, so the write
/// lock is held from the first read.
pub struct SqliteKeyStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteKeyStore {
    /// Create or open the store at `path`, creating parent directories and
    /// the schema as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = %path.display(), "opened provisioned key store");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::lock_error("key store connection poisoned"))
    }
}

impl KeyStore for SqliteKeyStore {
    fn insert_keys(&self, keys: &[ProvisionedKey]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        for key in keys {
            CertificateChain::parse(&key.certificate_chain)
                .map_err(|e| StoreError::invalid_chain(&key.key_blob, e))?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO provisioned_keys (key_blob, component, public_key, \
                 certificate_chain, expiration_time, client_uid, irpc_uid, assigned_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for key in keys {
                let assignment = key.assignment.as_ref();
                stmt.execute(params![
                    key.key_blob,
                    key.component,
                    key.public_key,
                    key.certificate_chain,
                    to_millis(key.expiration_time),
                    assignment.map(|a| a.client_uid),
                    assignment.map(|a| a.irpc_uid),
                    assignment.map(|a| to_millis(a.assigned_at)),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = keys.len(), "inserted provisioned keys");
        Ok(())
    }

    fn get_or_assign_key(
        &self,
        component: &str,
        now: OffsetDateTime,
        client_uid: i32,
        irpc_uid: i32,
    ) -> Result<Option<ProvisionedKey>> {
        let now_ms = to_millis(now);
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {KEY_COLUMNS} FROM provisioned_keys \
                     WHERE component = ?1 AND client_uid = ?2 AND irpc_uid = ?3 \
                     AND expiration_time >= ?4 ORDER BY id LIMIT 1"
                ),
                params![component, client_uid, irpc_uid, now_ms],
                key_from_row,
            )
            .optional()?;
        if let Some(key) = existing {
            tx.commit()?;
            return Ok(Some(key));
        }

        let candidate = tx
            .query_row(
                &format!(
                    "SELECT {KEY_COLUMNS} FROM provisioned_keys \
                     WHERE component = ?1 AND client_uid IS NULL AND expiration_time >= ?2 \
                     ORDER BY id LIMIT 1"
                ),
                params![component, now_ms],
                key_from_row,
            )
            .optional()?;
        let Some(mut key) = candidate else {
            return Ok(None);
        };
        let id = key
            .id
            .ok_or_else(|| StoreError::corrupt("selected key has no row id"))?;

        let updated = tx.execute(
            "UPDATE provisioned_keys SET client_uid = ?1, irpc_uid = ?2, assigned_at = ?3 \
             WHERE id = ?4 AND client_uid IS NULL",
            params![client_uid, irpc_uid, now_ms, id],
        )?;
        if updated != 1 {
            return Err(StoreError::AssignmentConflict(format!(
                "key {id} was assigned concurrently"
            )));
        }
        tx.commit()?;

        key.assignment = Some(KeyAssignment {
            client_uid,
            irpc_uid,
            assigned_at: from_millis(now_ms)?,
        });
        tracing::info!(component, client_uid, irpc_uid, key_id = id, "assigned attestation key");
        Ok(Some(key))
    }

    fn get_key_for_client_and_component(
        &self,
        component: &str,
        client_uid: i32,
        irpc_uid: i32,
    ) -> Result<Option<ProvisionedKey>> {
        let conn = self.lock()?;
        let key = conn
            .query_row(
                &format!(
                    "SELECT {KEY_COLUMNS} FROM provisioned_keys \
                     WHERE component = ?1 AND client_uid = ?2 AND irpc_uid = ?3 \
                     ORDER BY assigned_at DESC, id DESC LIMIT 1"
                ),
                params![component, client_uid, irpc_uid],
                key_from_row,
            )
            .optional()?;
        Ok(key)
    }

    fn total_keys_for_component(&self, component: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM provisioned_keys WHERE component = ?1",
            params![component],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn total_unassigned_keys_for_component(
        &self,
        component: &str,
        now: OffsetDateTime,
    ) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM provisioned_keys \
             WHERE component = ?1 AND client_uid IS NULL AND expiration_time >= ?2",
            params![component, to_millis(now)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn all_keys(&self) -> Result<Vec<ProvisionedKey>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {KEY_COLUMNS} FROM provisioned_keys ORDER BY id"
        ))?;
        let keys = stmt
            .query_map([], key_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn delete_all_keys(&self) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM provisioned_keys", [])?;
        tracing::info!(deleted, "deleted all provisioned keys");
        Ok(deleted)
    }

    fn delete_expiring_keys(&self, cutoff: OffsetDateTime) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM provisioned_keys WHERE expiration_time < ?1",
            params![to_millis(cutoff)],
        )?;
        if deleted > 0 {
            tracing::info!(deleted, %cutoff, "deleted expiring keys");
        }
        Ok(deleted)
    }

    fn last_bad_cert_window(&self) -> Result<Option<BadCertWindowRecord>> {
        let conn = self.lock()?;
        read_window(&conn)
    }

    fn purge_bad_cert_window(&self, window: &BadCertTimeRange) -> Result<PurgeOutcome> {
        let window = BadCertTimeRange::new(window.start, window.end)?;
        let (start_ms, end_ms) = (to_millis(window.start), to_millis(window.end));

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let recorded = read_window(&tx)?;
        if let Some(record) = &recorded {
            if to_millis(record.range.start) == start_ms && to_millis(record.range.end) == end_ms {
                return Ok(PurgeOutcome::AlreadyProcessed);
            }
        }
        let version = recorded.map_or(1, |record| record.version + 1);

        tx.execute(
            "INSERT INTO bad_cert_window (id, start_time, end_time, version) \
             VALUES (1, ?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET start_time = excluded.start_time, \
             end_time = excluded.end_time, version = excluded.version",
            params![start_ms, end_ms, version as i64],
        )?;

        let doomed = keys_issued_within(&tx, &window)?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM provisioned_keys WHERE id = ?1")?;
            for id in &doomed {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;

        tracing::info!(
            deleted,
            version,
            start = %window.start,
            end = %window.end,
            "purged keys issued inside bad certificate window"
        );
        Ok(PurgeOutcome::Purged { deleted, version })
    }
}

fn keys_issued_within(tx: &Transaction<'_>, window: &BadCertTimeRange) -> Result<Vec<i64>> {
    let mut stmt = tx.prepare("SELECT id, certificate_chain FROM provisioned_keys ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut doomed = Vec::new();
    for (id, chain) in rows {
        match leaf_not_before(&chain) {
            Ok(issued) if window.contains(issued) => doomed.push(id),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(key_id = id, error = %e, "stored chain no longer decodes, deleting");
                doomed.push(id);
            }
        }
    }
    Ok(doomed)
}

fn read_window(conn: &Connection) -> Result<Option<BadCertWindowRecord>> {
    let row = conn
        .query_row(
            "SELECT start_time, end_time, version FROM bad_cert_window WHERE id = 1",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
        )
        .optional()?;

    row.map(|(start, end, version)| {
        Ok(BadCertWindowRecord {
            range: BadCertTimeRange::new(from_millis(start)?, from_millis(end)?)?,
            version: version as u64,
        })
    })
    .transpose()
}

fn key_from_row(row: &Row<'_>) -> rusqlite::Result<ProvisionedKey> {
    let client_uid: Option<i32> = row.get(6)?;
    let irpc_uid: Option<i32> = row.get(7)?;
    let assigned_at: Option<i64> = row.get(8)?;

    let assignment = match (client_uid, irpc_uid, assigned_at) {
        (Some(client_uid), Some(irpc_uid), Some(assigned_at)) => Some(KeyAssignment {
            client_uid,
            irpc_uid,
            assigned_at: timestamp_column(8, assigned_at)?,
        }),
        (None, None, None) => None,
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                6,
                Type::Integer,
                Box::new(StoreError::corrupt("partially assigned key")),
            ))
        }
    };

    Ok(ProvisionedKey {
        id: Some(row.get(0)?),
        key_blob: row.get(1)?,
        component: row.get(2)?,
        public_key: row.get(3)?,
        certificate_chain: row.get(4)?,
        expiration_time: timestamp_column(5, row.get(5)?)?,
        assignment,
    })
}

fn timestamp_column(index: usize, millis: i64) -> rusqlite::Result<OffsetDateTime> {
    from_millis(millis)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use rkpd_pki::testing::{truncate_to_seconds, TestCa};
    use time::Duration;

    use super::*;

    const COMPONENT: &str = "android.hardware.security.keymint.IRemotelyProvisionedComponent/default";

    fn now() -> OffsetDateTime {
        truncate_to_seconds(OffsetDateTime::now_utc())
    }

    fn test_ca() -> TestCa {
        let now = now();
        TestCa::new(now - Duration::days(60), now + Duration::days(60)).unwrap()
    }

    fn key_issued_at(
        ca: &TestCa,
        component: &str,
        issued: OffsetDateTime,
        expires: OffsetDateTime,
    ) -> ProvisionedKey {
        let (pair, chain) = ca.issue_chain(issued, expires).unwrap();
        ProvisionedKey::new(
            pair.serialize_der(),
            component,
            pair.public_key_raw().to_vec(),
            chain,
            expires,
        )
    }

    fn fresh_keys(ca: &TestCa, component: &str, count: usize) -> Vec<ProvisionedKey> {
        let now = now();
        (0..count)
            .map(|_| key_issued_at(ca, component, now - Duration::hours(1), now + Duration::days(7)))
            .collect()
    }

    #[test]
    fn test_insert_and_count() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let ca = test_ca();
        store.insert_keys(&fresh_keys(&ca, COMPONENT, 3)).unwrap();
        store.insert_keys(&fresh_keys(&ca, "other", 2)).unwrap();

        assert_eq!(store.total_keys_for_component(COMPONENT).unwrap(), 3);
        assert_eq!(store.total_unassigned_keys_for_component(COMPONENT, now()).unwrap(), 3);
        assert_eq!(store.total_keys_for_component("other").unwrap(), 2);
        assert_eq!(store.all_keys().unwrap().len(), 5);
    }

    #[test]
    fn test_batch_with_invalid_chain_is_rejected_whole() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let ca = test_ca();
        let mut keys = fresh_keys(&ca, COMPONENT, 3);
        keys[1].certificate_chain.truncate(10);

        assert!(matches!(
            store.insert_keys(&keys),
            Err(StoreError::InvalidChain { .. })
        ));
        assert!(store.all_keys().unwrap().is_empty());
    }

    #[test]
    fn test_stored_chains_revalidate() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        store.insert_keys(&fresh_keys(&test_ca(), COMPONENT, 2)).unwrap();

        for key in store.all_keys().unwrap() {
            let chain = CertificateChain::parse(&key.certificate_chain).unwrap();
            assert!(chain.len() > 1);
            assert_eq!(chain.leaf().info.public_key, key.public_key);
        }
    }

    #[test]
    fn test_get_or_assign_is_idempotent() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        store.insert_keys(&fresh_keys(&test_ca(), COMPONENT, 3)).unwrap();
        let now = now();

        let first = store.get_or_assign_key(COMPONENT, now, 1000, 2000).unwrap().unwrap();
        let second = store
            .get_or_assign_key(COMPONENT, now + Duration::minutes(5), 1000, 2000)
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.assignment.unwrap().assigned_at, now);
        assert_eq!(store.total_unassigned_keys_for_component(COMPONENT, now).unwrap(), 2);
        assert_eq!(
            store.get_key_for_client_and_component(COMPONENT, 1000, 2000).unwrap(),
            Some(first)
        );
    }

    #[test]
    fn test_assignment_picks_lowest_row_id() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        store.insert_keys(&fresh_keys(&test_ca(), COMPONENT, 3)).unwrap();
        let ids: Vec<_> = store.all_keys().unwrap().iter().map(|k| k.id).collect();

        let a = store.get_or_assign_key(COMPONENT, now(), 1, 1).unwrap().unwrap();
        let b = store.get_or_assign_key(COMPONENT, now(), 2, 1).unwrap().unwrap();

        assert_eq!(a.id, ids[0]);
        assert_eq!(b.id, ids[1]);
    }

    #[test]
    fn test_expired_keys_are_never_assigned() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let ca = test_ca();
        let now = now();
        let expired = key_issued_at(&ca, COMPONENT, now - Duration::days(2), now - Duration::days(1));
        store.insert_keys(&[expired]).unwrap();

        assert_eq!(store.total_unassigned_keys_for_component(COMPONENT, now).unwrap(), 0);
        assert!(store.get_or_assign_key(COMPONENT, now, 1, 1).unwrap().is_none());
    }

    #[test]
    fn test_expired_assignment_is_replaced() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let ca = test_ca();
        let now = now();
        let short = key_issued_at(&ca, COMPONENT, now - Duration::hours(1), now + Duration::hours(1));
        let long = key_issued_at(&ca, COMPONENT, now - Duration::hours(1), now + Duration::days(5));
        store.insert_keys(&[short, long]).unwrap();

        let first = store.get_or_assign_key(COMPONENT, now, 7, 7).unwrap().unwrap();
        let later = now + Duration::hours(2);
        let second = store.get_or_assign_key(COMPONENT, later, 7, 7).unwrap().unwrap();

        assert_ne!(first.id, second.id);
        assert!(!second.is_expired_at(later));
    }

    #[test]
    fn test_no_keys_for_component() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        store.insert_keys(&fresh_keys(&test_ca(), "other", 1)).unwrap();
        assert!(store.get_or_assign_key(COMPONENT, now(), 1, 1).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_assignment_hands_out_distinct_keys() {
        let store = Arc::new(SqliteKeyStore::open_in_memory().unwrap());
        store.insert_keys(&fresh_keys(&test_ca(), COMPONENT, 8)).unwrap();
        let now = now();

        let handles: Vec<_> = (0..10)
            .map(|uid| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get_or_assign_key(COMPONENT, now, uid, 0).unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let assigned: Vec<_> = results.iter().flatten().collect();
        let distinct: HashSet<_> = assigned.iter().map(|k| k.id).collect();
        assert_eq!(assigned.len(), 8);
        assert_eq!(distinct.len(), 8);
        assert_eq!(results.iter().filter(|r| r.is_none()).count(), 2);
    }

    #[test]
    fn test_concurrent_assignment_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let seed = SqliteKeyStore::open(&path).unwrap();
        seed.insert_keys(&fresh_keys(&test_ca(), COMPONENT, 6)).unwrap();
        let now = now();

        let handles: Vec<_> = (0..2)
            .map(|process| {
                let path = path.clone();
                thread::spawn(move || {
                    let store = SqliteKeyStore::open(&path).unwrap();
                    (0..3)
                        .map(|i| {
                            store
                                .get_or_assign_key(COMPONENT, now, process * 10 + i, 0)
                                .unwrap()
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let distinct: HashSet<_> = ids.iter().collect();
        assert_eq!(distinct.len(), 6);
        assert_eq!(seed.total_unassigned_keys_for_component(COMPONENT, now).unwrap(), 0);
    }

    #[test]
    fn test_same_tuple_concurrently_gets_one_key() {
        let store = Arc::new(SqliteKeyStore::open_in_memory().unwrap());
        store.insert_keys(&fresh_keys(&test_ca(), COMPONENT, 4)).unwrap();
        let now = now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get_or_assign_key(COMPONENT, now, 5, 5).unwrap().unwrap())
            })
            .collect();
        let ids: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap().id).collect();

        assert_eq!(ids.len(), 1);
        assert_eq!(store.total_unassigned_keys_for_component(COMPONENT, now).unwrap(), 3);
    }

    fn window_fixture(store: &SqliteKeyStore) -> BadCertTimeRange {
        let now = now();
        let start = now - Duration::days(5);
        let end = now - Duration::days(2);
        let ca = test_ca();
        let expires = now + Duration::days(1);
        store
            .insert_keys(&[
                key_issued_at(&ca, "fakeHal1", start - Duration::days(1), expires),
                key_issued_at(&ca, "fakeHal2", start + Duration::hours(1), expires),
                key_issued_at(&ca, "fakeHal3", end + Duration::days(1), expires),
            ])
            .unwrap();
        BadCertTimeRange::new(start, end).unwrap()
    }

    #[test]
    fn test_purge_deletes_keys_inside_window() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let window = window_fixture(&store);

        let outcome = store.purge_bad_cert_window(&window).unwrap();
        assert_eq!(outcome, PurgeOutcome::Purged { deleted: 1, version: 1 });

        let survivors: Vec<_> = store.all_keys().unwrap().into_iter().map(|k| k.component).collect();
        assert_eq!(survivors, vec!["fakeHal1", "fakeHal3"]);
        assert_eq!(store.last_bad_cert_window().unwrap().unwrap().range, window);
    }

    #[test]
    fn test_purge_is_idempotent() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let window = window_fixture(&store);

        assert_eq!(store.purge_bad_cert_window(&window).unwrap().deleted(), 1);
        let ca = test_ca();
        // A key issued inside the window after processing must not be re-scanned.
        store
            .insert_keys(&[key_issued_at(
                &ca,
                "late",
                window.start + Duration::hours(2),
                now() + Duration::days(1),
            )])
            .unwrap();

        assert_eq!(
            store.purge_bad_cert_window(&window).unwrap(),
            PurgeOutcome::AlreadyProcessed
        );
        assert_eq!(store.all_keys().unwrap().len(), 3);
    }

    #[test]
    fn test_purge_bounds_are_inclusive() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let ca = test_ca();
        let now = now();
        let start = now - Duration::days(4);
        let end = now - Duration::days(3);
        let expires = now + Duration::days(1);
        store
            .insert_keys(&[
                key_issued_at(&ca, "at-start", start, expires),
                key_issued_at(&ca, "at-end", end, expires),
                key_issued_at(&ca, "before", start - Duration::seconds(1), expires),
                key_issued_at(&ca, "after", end + Duration::seconds(1), expires),
            ])
            .unwrap();

        let outcome = store
            .purge_bad_cert_window(&BadCertTimeRange::new(start, end).unwrap())
            .unwrap();
        assert_eq!(outcome.deleted(), 2);

        let survivors: Vec<_> = store.all_keys().unwrap().into_iter().map(|k| k.component).collect();
        assert_eq!(survivors, vec!["before", "after"]);
    }

    #[test]
    fn test_new_window_bumps_version() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let window = window_fixture(&store);
        store.purge_bad_cert_window(&window).unwrap();

        let wider = BadCertTimeRange::new(window.start - Duration::days(3), window.end).unwrap();
        assert_eq!(
            store.purge_bad_cert_window(&wider).unwrap(),
            PurgeOutcome::Purged { deleted: 1, version: 2 }
        );
        assert_eq!(store.last_bad_cert_window().unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_recorded_window_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keys.db");
        let window = {
            let store = SqliteKeyStore::open(&path).unwrap();
            let window = window_fixture(&store);
            store.purge_bad_cert_window(&window).unwrap();
            window
        };

        let reopened = SqliteKeyStore::open(&path).unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert_eq!(
            reopened.purge_bad_cert_window(&window).unwrap(),
            PurgeOutcome::AlreadyProcessed
        );
        assert_eq!(reopened.all_keys().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_expiring_and_all() {
        let store = SqliteKeyStore::open_in_memory().unwrap();
        let ca = test_ca();
        let now = now();
        store
            .insert_keys(&[
                key_issued_at(&ca, COMPONENT, now - Duration::days(1), now + Duration::hours(12)),
                key_issued_at(&ca, COMPONENT, now - Duration::days(1), now + Duration::days(10)),
            ])
            .unwrap();
        store.get_or_assign_key(COMPONENT, now, 1, 1).unwrap().unwrap();

        // The assigned, soon-to-expire key goes too.
        assert_eq!(store.delete_expiring_keys(now + Duration::days(3)).unwrap(), 1);
        assert_eq!(store.total_keys_for_component(COMPONENT).unwrap(), 1);
        assert!(store.get_key_for_client_and_component(COMPONENT, 1, 1).unwrap().is_none());

        assert_eq!(store.delete_all_keys().unwrap(), 1);
        assert_eq!(store.delete_all_keys().unwrap(), 0);
    }
}
