//! Entry CRUD operations.
//!
//! Entries map a GET request (by canonical URL) to a stored response.

use super::connection::CacheDb;
use super::hash::request_key;
use crate::http::parse_http_date;
use crate::{Error, Request, Response};
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;
use url::Url;

/// A stored response together with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub store: String,
    pub key_hash: String,
    pub url: String,
    pub response: Response,
    pub stored_at: String,
}

/// Entry listing without the body.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMeta {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    /// Parsed `Date` response header, if present and well-formed.
    pub date: Option<DateTime<Utc>>,
}

/// The URL form used for keys: fragments never reach the network.
fn entry_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

struct Row {
    key_hash: String,
    method: String,
    url: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl Row {
    fn encode(request: &Request, response: &Response) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("only GET requests are stored, got {}", request.method)));
        }
        let url = entry_url(&request.url);
        Ok(Self {
            key_hash: request_key(&request.method, &url),
            method: request.method.clone(),
            url,
            status: i64::from(response.status),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }
}

impl CacheDb {
    /// Store one response under `request`, replacing any previous entry.
    pub async fn put_entry(&self, store: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_entries(store, vec![(request.clone(), response.clone())])
            .await
    }

    /// Store several responses in one transaction.
    ///
    /// Either every entry is written or none is. The store is created if it
    /// does not exist yet.
    pub async fn put_entries(&self, store: &str, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(req, resp)| Row::encode(req, resp))
            .collect::<Result<Vec<_>, _>>()?;
        let store = store.to_string();
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute("INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)", params![store, now])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (store, key_hash, method, url, status, headers_json, body, stored_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                         ON CONFLICT(store, key_hash) DO UPDATE SET
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            store,
                            row.key_hash,
                            row.method,
                            row.url,
                            row.status,
                            row.headers_json,
                            row.body,
                            now
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Find the entry for `request` in the first of `stores` that has one.
    pub async fn match_entry(&self, stores: &[String], request: &Request) -> Result<Option<CachedEntry>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let url = entry_url(&request.url);
        let key_hash = request_key(&request.method, &url);
        let stores = stores.to_vec();

        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, headers_json, body, stored_at FROM entries WHERE store = ?1 AND key_hash = ?2",
                )?;
                for store in stores {
                    let found = stmt
                        .query_row(params![store, key_hash], |row| {
                            Ok((
                                row.get::<_, i64>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, Vec<u8>>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        })
                        .optional()?;

                    if let Some((status, headers_json, body, stored_at)) = found {
                        let status =
                            u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?;
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        return Ok(Some(CachedEntry {
                            store,
                            key_hash: key_hash.clone(),
                            url: url.clone(),
                            response: Response { status, headers, body: body.into() },
                            stored_at,
                        }));
                    }
                }
                Ok(None)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry by key. Returns false if it was not there.
    pub async fn delete_entry(&self, store: &str, key_hash: &str) -> Result<bool, Error> {
        let store = store.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted =
                    conn.execute("DELETE FROM entries WHERE store = ?1 AND key_hash = ?2", params![store, key_hash])?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// List the entries of a store, oldest write first.
    pub async fn list_entries(&self, store: &str) -> Result<Vec<EntryMeta>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, method, url, headers_json FROM entries WHERE store = ?1 ORDER BY stored_at ASC",
                )?;
                let rows = stmt
                    .query_map(params![store], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(key_hash, method, url, headers_json)| -> Result<EntryMeta, Error> {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        let date = headers
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case("date"))
                            .and_then(|(_, v)| parse_http_date(v));
                        Ok(EntryMeta { key_hash, method, url, date })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_entries(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE store = ?1", params![store], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
