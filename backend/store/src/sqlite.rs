//! SQLite-backed partner store.
//!
//! One row per partner in the `remote_partners` table. The api key, salt and
//! authentication token columns are always written by the same statement.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use wor_core::{canonical_address, PartnerCredentials, PartnerRecord, PartnerStatus, PartnerStore};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS remote_partners (
         id                   INTEGER PRIMARY KEY AUTOINCREMENT,
         url                  TEXT NOT NULL UNIQUE COLLATE NOCASE,
         name                 TEXT NOT NULL DEFAULT '',
         status               TEXT NOT NULL,
         api_key              TEXT,
         salt                 TEXT,
         authentication_token TEXT,
         added_at             TEXT NOT NULL
     );";

const COLUMNS: &str = "id, url, name, status, api_key, salt, authentication_token, added_at";

pub struct SqlitePartnerStore {
    conn: Mutex<Connection>,
}

impl SqlitePartnerStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open partner database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize remote_partners schema")?;
        info!(path = %path.as_ref().display(), "Partner store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

struct RawRow {
    id: i64,
    url: String,
    name: String,
    status: String,
    api_key: Option<String>,
    salt: Option<String>,
    authentication_token: Option<String>,
    added_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        api_key: row.get(4)?,
        salt: row.get(5)?,
        authentication_token: row.get(6)?,
        added_at: row.get(7)?,
    })
}

fn into_record(raw: RawRow) -> Result<PartnerRecord> {
    let status: PartnerStatus = raw.status.parse().map_err(|e: String| anyhow!(e))?;
    let added_at = DateTime::parse_from_rfc3339(&raw.added_at)
        .with_context(|| format!("Bad added_at for partner {}", raw.id))?
        .with_timezone(&Utc);

    let credentials = match (raw.api_key, raw.salt, raw.authentication_token) {
        (Some(api_key), Some(salt), Some(authentication_token)) if status == PartnerStatus::Approved => {
            Some(PartnerCredentials {
                api_key,
                salt,
                authentication_token,
            })
        }
        (None, None, None) => None,
        _ => {
            warn!(id = raw.id, url = %raw.url, "Ignoring incomplete credentials on partner row");
            None
        }
    };

    Ok(PartnerRecord {
        id: Some(raw.id),
        url: raw.url,
        name: raw.name,
        status,
        credentials,
        added_at,
    })
}

fn credential_columns(record: &PartnerRecord) -> (Option<&str>, Option<&str>, Option<&str>) {
    match &record.credentials {
        Some(c) => (
            Some(c.api_key.as_str()),
            Some(c.salt.as_str()),
            Some(c.authentication_token.as_str()),
        ),
        None => (None, None, None),
    }
}

fn query_one(conn: &Connection, sql: &str, param: &dyn rusqlite::ToSql) -> Result<Option<PartnerRecord>> {
    let raw = conn
        .query_row(sql, params![param], read_row)
        .optional()?;
    raw.map(into_record).transpose()
}

/// Match on the canonical address so `B.example.org/` finds `b.example.org`.
fn find_by_url(conn: &Connection, url: &str) -> Result<Option<PartnerRecord>> {
    query_one(
        conn,
        &format!("SELECT {COLUMNS} FROM remote_partners WHERE rtrim(trim(url), '/') = ?1 COLLATE NOCASE"),
        &canonical_address(url),
    )
}

#[async_trait]
impl PartnerStore for SqlitePartnerStore {
    async fn get_by_url(&self, url: &str) -> Result<Option<PartnerRecord>> {
        let conn = self.conn.lock().await;
        find_by_url(&conn, url)
    }

    async fn get(&self, id: i64) -> Result<Option<PartnerRecord>> {
        let conn = self.conn.lock().await;
        query_one(&conn, &format!("SELECT {COLUMNS} FROM remote_partners WHERE id = ?1"), &id)
    }

    async fn list(&self) -> Result<Vec<PartnerRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM remote_partners ORDER BY id ASC"))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(into_record).collect()
    }

    async fn create(&self, mut record: PartnerRecord) -> Result<PartnerRecord> {
        let conn = self.conn.lock().await;
        if let Some(existing) = find_by_url(&conn, &record.url)? {
            bail!("partner {} already exists as {}", record.url, existing.url);
        }
        let (api_key, salt, token) = credential_columns(&record);
        conn.execute(
            "INSERT INTO remote_partners (url, name, status, api_key, salt, authentication_token, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.url,
                record.name,
                record.status.as_str(),
                api_key,
                salt,
                token,
                record.added_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to create partner {}", record.url))?;
        record.id = Some(conn.last_insert_rowid());
        debug!(url = %record.url, id = ?record.id, "Created partner row");
        Ok(record)
    }

    async fn update(&self, record: PartnerRecord) -> Result<PartnerRecord> {
        let id = record.id.ok_or_else(|| anyhow!("cannot update partner without id"))?;
        let conn = self.conn.lock().await;
        let (api_key, salt, token) = credential_columns(&record);
        let changed = conn
            .execute(
                "UPDATE remote_partners
                 SET url = ?2, name = ?3, status = ?4, api_key = ?5, salt = ?6, authentication_token = ?7
                 WHERE id = ?1",
                params![id, record.url, record.name, record.status.as_str(), api_key, salt, token],
            )
            .with_context(|| format!("Failed to update partner {}", record.url))?;
        if changed == 0 {
            bail!("partner {id} does not exist");
        }
        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM remote_partners WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(key: &str) -> PartnerCredentials {
        PartnerCredentials {
            api_key: key.into(),
            salt: format!("salt-{key}"),
            authentication_token: format!("token-{key}"),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_url() {
        let store = SqlitePartnerStore::in_memory().unwrap();
        let created = store
            .create(PartnerRecord::approved("b.example.org", "Registry B", credentials("k1")))
            .await
            .unwrap();
        assert!(created.id.is_some());

        let fetched = store.get_by_url("B.EXAMPLE.ORG").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.name, "Registry B");
        assert_eq!(fetched.status, PartnerStatus::Approved);
        assert_eq!(fetched.credentials, Some(credentials("k1")));
    }

    #[tokio::test]
    async fn test_failed_contact_has_no_credentials() {
        let store = SqlitePartnerStore::in_memory().unwrap();
        store
            .create(PartnerRecord::unconfirmed("peer.example.org", "", PartnerStatus::ContactFailed))
            .await
            .unwrap();
        let fetched = store.get_by_url("peer.example.org").await.unwrap().unwrap();
        assert_eq!(fetched.status, PartnerStatus::ContactFailed);
        assert!(fetched.api_key().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let store = SqlitePartnerStore::in_memory().unwrap();
        store
            .create(PartnerRecord::unconfirmed("b.example.org", "", PartnerStatus::NotContacted))
            .await
            .unwrap();
        let dup = store
            .create(PartnerRecord::unconfirmed("b.example.org", "", PartnerStatus::NotContacted))
            .await;
        assert!(dup.is_err());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trailing_slash_names_the_same_partner() {
        let store = SqlitePartnerStore::in_memory().unwrap();
        let created = store
            .create(PartnerRecord::unconfirmed("b.example.org", "", PartnerStatus::NotContacted))
            .await
            .unwrap();

        let fetched = store.get_by_url("B.Example.org/").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);

        let dup = store
            .create(PartnerRecord::unconfirmed("b.example.org/", "", PartnerStatus::NotContacted))
            .await;
        assert!(dup.is_err());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_credentials() {
        let store = SqlitePartnerStore::in_memory().unwrap();
        let mut record = store
            .create(PartnerRecord::approved("b.example.org", "B", credentials("old")))
            .await
            .unwrap();
        record.approve(credentials("new"));
        store.update(record.clone()).await.unwrap();

        let fetched = store.get(record.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(fetched.credentials, Some(credentials("new")));
        assert_eq!(fetched.url, "b.example.org");
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = SqlitePartnerStore::in_memory().unwrap();
        let a = store
            .create(PartnerRecord::approved("a.example.org", "A", credentials("a")))
            .await
            .unwrap();
        store
            .create(PartnerRecord::approved("b.example.org", "B", credentials("b")))
            .await
            .unwrap();

        assert!(store.delete(a.id.unwrap()).await.unwrap());
        let remaining = store.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].url, "b.example.org");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partners.db");
        {
            let store = SqlitePartnerStore::open(&path).unwrap();
            store
                .create(PartnerRecord::approved("b.example.org", "B", credentials("k")))
                .await
                .unwrap();
        }
        let store = SqlitePartnerStore::open(&path).unwrap();
        let fetched = store.get_by_url("b.example.org").await.unwrap().unwrap();
        assert_eq!(fetched.api_key(), Some("k"));
    }
}
