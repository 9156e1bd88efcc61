//! Named partitions and the entries stored in them.
//!
//! A partition maps request descriptors to responses. Entries keep their
//! insertion order, which is what trimming evicts by. Partitions themselves
//! keep creation order, which is what [`CacheDb::lookup_any`] searches by.

use super::connection::CacheDb;
use crate::request::{Destination, RequestDescriptor};
use crate::response::{Response, ResponseKind};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use url::Url;

/// Handle to an open partition.
///
/// Operations on a handle whose partition has since been deleted fail with a
/// storage error.
#[derive(Clone, Debug)]
pub struct Partition {
    db: CacheDb,
    seq: i64,
    name: String,
}

/// Partition name and entry count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartitionStats {
    pub name: String,
    pub entries: u64,
}

/// Owned row data ready to move onto the database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    destination: &'static str,
    request_headers_json: String,
    status: u16,
    kind: &'static str,
    redirected: bool,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &RequestDescriptor, response: Response) -> Result<Self, Error> {
        let request_headers_json =
            serde_json::to_string(request.headers()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let headers_json =
            serde_json::to_string(response.headers()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            key_hash: request.cache_key(),
            method: request.method().to_string(),
            url: request.match_url(),
            destination: request.destination().as_str(),
            request_headers_json,
            status: response.status(),
            kind: response.kind().as_str(),
            redirected: response.redirected(),
            headers_json,
            body: response.into_body().to_vec(),
        })
    }

    /// Replace any existing entry for the key, appending it at the end of the
    /// insertion order.
    fn insert(&self, conn: &rusqlite::Connection, seq: i64, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            "DELETE FROM entries WHERE partition_seq = ?1 AND key_hash = ?2",
            params![seq, &self.key_hash],
        )?;
        conn.execute(
            "INSERT INTO entries (
                partition_seq, key_hash, method, url, destination, request_headers_json,
                status, kind, redirected, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                seq,
                &self.key_hash,
                &self.method,
                &self.url,
                self.destination,
                &self.request_headers_json,
                self.status,
                self.kind,
                self.redirected as i32,
                &self.headers_json,
                &self.body,
                stored_at,
            ],
        )?;
        Ok(())
    }
}

type RawResponse = (i64, String, i32, String, Vec<u8>);

fn decode_response((status, kind, redirected, headers_json, body): RawResponse) -> Result<Response, Error> {
    let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?;
    let kind: ResponseKind = kind.parse().map_err(Error::CorruptEntry)?;
    let headers: Vec<(String, String)> =
        serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    Ok(Response::new(status, kind, body)
        .with_headers(headers)
        .with_redirected(redirected == 1))
}

fn read_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawResponse> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

impl CacheDb {
    /// Open a partition, creating it if it doesn't exist.
    pub async fn open_partition(&self, name: &str) -> Result<Partition, Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let lookup = name.clone();
        let seq = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![lookup, created_at],
                )?;
                let seq = conn.query_row("SELECT seq FROM partitions WHERE name = ?1", params![lookup], |row| {
                    row.get(0)
                })?;
                Ok(seq)
            })
            .await
            .map_err(Error::from)?;

        Ok(Partition { db: self.clone(), seq, name })
    }

    /// Whether a partition with this name exists.
    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All partition names, in creation order.
    pub async fn list_partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY seq ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all its entries.
    ///
    /// Returns whether a partition was deleted.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up across every partition, oldest partition first.
    pub async fn lookup_any(&self, request: &RequestDescriptor) -> Result<Option<Response>, Error> {
        let key_hash = request.cache_key();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawResponse>, Error> {
                let raw = conn
                    .query_row(
                        "SELECT e.status, e.kind, e.redirected, e.headers_json, e.body
                        FROM entries e JOIN partitions p ON p.seq = e.partition_seq
                        WHERE e.key_hash = ?1
                        ORDER BY p.seq ASC LIMIT 1",
                        params![key_hash],
                        read_response,
                    )
                    .optional()?;
                Ok(raw)
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_response).transpose()
    }

    /// Entry counts per partition, in creation order.
    pub async fn partition_stats(&self) -> Result<Vec<PartitionStats>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PartitionStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.name, COUNT(e.id) FROM partitions p
                    LEFT JOIN entries e ON e.partition_seq = p.seq
                    GROUP BY p.seq ORDER BY p.seq ASC",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(PartitionStats { name: row.get(0)?, entries: row.get::<_, i64>(1)? as u64 })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look a request up in this partition only.
    pub async fn lookup(&self, request: &RequestDescriptor) -> Result<Option<Response>, Error> {
        let key_hash = request.cache_key();
        let seq = self.seq;
        let raw = self
            .db
            .conn
            .call(move |conn| -> Result<Option<RawResponse>, Error> {
                let raw = conn
                    .query_row(
                        "SELECT status, kind, redirected, headers_json, body
                        FROM entries WHERE partition_seq = ?1 AND key_hash = ?2",
                        params![seq, key_hash],
                        read_response,
                    )
                    .optional()?;
                Ok(raw)
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_response).transpose()
    }

    /// Store a response, replacing any entry with the same key.
    pub async fn put(&self, request: &RequestDescriptor, response: Response) -> Result<(), Error> {
        let row = EntryRow::new(request, response)?;
        let seq = self.seq;
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> { row.insert(conn, seq, &stored_at) })
            .await
            .map_err(Error::from)
    }

    /// Store a batch atomically: either every entry lands or none does.
    pub async fn put_all(&self, entries: Vec<(RequestDescriptor, Response)>) -> Result<(), Error> {
        let rows = entries
            .into_iter()
            .map(|(request, response)| EntryRow::new(&request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let seq = self.seq;
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    row.insert(&tx, seq, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Request descriptors of every entry, oldest first.
    pub async fn keys(&self) -> Result<Vec<RequestDescriptor>, Error> {
        let seq = self.seq;
        let rows = self
            .db
            .conn
            .call(move |conn| -> Result<Vec<(String, String, String, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, destination, request_headers_json
                    FROM entries WHERE partition_seq = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map(params![seq], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(method, url, destination, headers_json)| {
                let url = Url::parse(&url).map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;
                let destination: Destination = destination.parse().map_err(Error::CorruptEntry)?;
                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                Ok(headers
                    .iter()
                    .fold(RequestDescriptor::new(&method, url, destination), |req, (k, v)| req.with_header(k, v)))
            })
            .collect()
    }

    /// Delete the entry for a request. Returns whether one existed.
    pub async fn delete(&self, request: &RequestDescriptor) -> Result<bool, Error> {
        let key_hash = request.cache_key();
        let seq = self.seq;
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition_seq = ?1 AND key_hash = ?2",
                    params![seq, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this partition.
    pub async fn len(&self) -> Result<usize, Error> {
        let seq = self.seq;
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition_seq = ?1", params![seq], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }
}
