use crate::blob_client::BlobClient;
use crate::errors::AppError;
use chrono::Utc;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Maximum read-merge-write attempts before a CAS conflict is surfaced.
const MAX_UPSERT_ATTEMPTS: u32 = 5;
/// Base delay between conflict retries; grows linearly per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Field names managed by the store itself, not by callers.
const VERSION_FIELD: &str = "version";
const CHECKSUM_FIELD: &str = "_checksum";
const UPDATED_FIELD: &str = "lastUpdated";

// ============ Deterministic keys ============

/// Sanitizes an email address into a path-safe token:
/// `jan@bedrijf.nl` -> `jan-at-bedrijf-dot-nl`. Lowercased first so the
/// same mailbox always maps to the same blob.
pub fn sanitize_email_key(email: &str) -> String {
    email
        .trim()
        .to_lowercase()
        .replace('@', "-at-")
        .replace('.', "-dot-")
}

pub fn customer_path(email: &str) -> String {
    format!("customers/{}.json", sanitize_email_key(email))
}

pub fn order_path(email: &str, order_number: &str) -> String {
    format!("customers/{}/orders/{}.json", sanitize_email_key(email), order_number)
}

pub fn order_prefix(email: &str) -> String {
    format!("customers/{}/orders/", sanitize_email_key(email))
}

pub fn counter_path(year: i32) -> String {
    format!("counters/orders-{}.json", year)
}

// ============ Merge ============

/// Shallow-merges `patch` onto `existing`, with deep handling for the known
/// nested collections:
///
/// - `employees` is merged element-wise by `email` (replace the matching
///   entry, append otherwise), never shallow-overwritten.
/// - `leadData` is merged by `id`; incoming leads whose `sheetRowNumber`
///   already exists in the record are dropped as import duplicates.
/// - A `null` in the patch leaves the existing value intact, so partial
///   DTOs never erase fields they did not mention.
///
/// Store-managed fields (`version`, `_checksum`, `lastUpdated`) in the
/// patch are ignored; the upsert stamps them itself.
pub fn merge_records(existing: &Value, patch: &Value) -> Value {
    let mut merged = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    merged.remove(CHECKSUM_FIELD);

    let Value::Object(patch_map) = patch else {
        return Value::Object(merged);
    };

    for (key, incoming) in patch_map {
        if incoming.is_null()
            || key == VERSION_FIELD
            || key == CHECKSUM_FIELD
            || key == UPDATED_FIELD
        {
            continue;
        }
        let replacement = match (key.as_str(), merged.get(key)) {
            ("employees", Some(current)) => merge_array_by_key(current, incoming, "email", None),
            ("leadData", Some(current)) => {
                merge_array_by_key(current, incoming, "id", Some("sheetRowNumber"))
            }
            _ => incoming.clone(),
        };
        merged.insert(key.clone(), replacement);
    }

    Value::Object(merged)
}

/// Merges two JSON arrays of objects by a key field: entries from `incoming`
/// replace the existing entry with the same key, or are appended. When
/// `dedup_field` is set, incoming entries carrying an already-present value
/// in that field are skipped entirely (spreadsheet import de-duplication).
fn merge_array_by_key(
    existing: &Value,
    incoming: &Value,
    key_field: &str,
    dedup_field: Option<&str>,
) -> Value {
    let mut result: Vec<Value> = existing.as_array().cloned().unwrap_or_default();
    let Some(incoming_items) = incoming.as_array() else {
        return Value::Array(result);
    };

    for item in incoming_items {
        if let Some(dedup) = dedup_field {
            if let Some(marker) = item.get(dedup).filter(|v| !v.is_null()) {
                let duplicate = result
                    .iter()
                    .any(|r| r.get(key_field) != item.get(key_field) && r.get(dedup) == Some(marker));
                if duplicate {
                    continue;
                }
            }
        }
        let position = result
            .iter()
            .position(|r| !item.get(key_field).map_or(true, |k| k.is_null()) && r.get(key_field) == item.get(key_field));
        match position {
            Some(index) => result[index] = item.clone(),
            None => result.push(item.clone()),
        }
    }
    Value::Array(result)
}

// ============ Checksums ============

/// Hex SHA-256 over the record with store-managed checksum removed. Stored
/// alongside the record so a torn or corrupted blob is detected on read
/// instead of being silently merged against.
fn record_checksum(record: &Value) -> String {
    let canonical = match record {
        Value::Object(map) => {
            let mut stripped = map.clone();
            stripped.remove(CHECKSUM_FIELD);
            // Serialize through a BTreeMap so the digest never depends on
            // field order.
            let ordered: std::collections::BTreeMap<_, _> = stripped.iter().collect();
            serde_json::to_string(&ordered).unwrap_or_default()
        }
        other => other.to_string(),
    };
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn verify_checksum(record: &Value) -> bool {
    match record.get(CHECKSUM_FIELD).and_then(|v| v.as_str()) {
        // Legacy blobs predate checksumming; accept them as-is.
        None => true,
        Some(stored) => stored == record_checksum(record),
    }
}

// ============ Store ============

/// A record loaded from the store, with the pathname it was actually found
/// at (which may be a legacy path that only prefix-matched).
#[derive(Debug, Clone)]
pub struct LoadedRecord {
    pub value: Value,
    pub pathname: String,
    pub url: String,
}

/// Read-merge-write persistence over the blob store.
///
/// Every record kind (customers, orders, counters) goes through the same
/// discipline: exact-key lookup with a suffixless fallback for legacy paths,
/// fail-open on "not found", fail-closed on "found but unreadable", typed
/// merge, and a version-token conditional write retried with bounded
/// backoff on conflict. The conditional write is what keeps at most one
/// blob per deterministic key and turns the classic lost-update race into
/// a retry.
#[derive(Debug, Clone)]
pub struct RecordStore {
    blob: BlobClient,
}

impl RecordStore {
    pub fn new(blob: BlobClient) -> Self {
        Self { blob }
    }

    /// Looks up and parses the record at `path`.
    ///
    /// Returns `Ok(None)` only when no blob exists for the key (fail-open:
    /// the caller may create the record). A blob that exists but cannot be
    /// fetched or parsed is a hard `Persistence` error - merging against a
    /// phantom "empty" record would silently discard the stored data.
    pub async fn load(&self, path: &str) -> Result<Option<LoadedRecord>, AppError> {
        let mut entry = self
            .blob
            .list(path)
            .await?
            .into_iter()
            .find(|e| e.pathname == path);
        if entry.is_none() {
            // Legacy fallback: some early records were written without the
            // .json suffix. Only the exact suffixless key qualifies; every
            // other pathname extending the stem belongs to a different
            // record (another customer's key, or a nested order blob).
            if let Some(stem) = path.strip_suffix(".json") {
                entry = self
                    .blob
                    .list(stem)
                    .await?
                    .into_iter()
                    .find(|e| e.pathname == stem);
            }
        }
        let Some(entry) = entry else {
            return Ok(None);
        };

        let Some(content) = self.blob.fetch(&entry.url).await? else {
            // Listed but gone by fetch time: treat as not found.
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            AppError::Persistence(format!("Record at '{}' is unreadable: {}", entry.pathname, e))
        })?;
        if !verify_checksum(&value) {
            return Err(AppError::Persistence(format!(
                "Record at '{}' failed checksum verification",
                entry.pathname
            )));
        }
        Ok(Some(LoadedRecord {
            value,
            pathname: entry.pathname,
            url: entry.url,
        }))
    }

    /// Read-merge-write upsert of `patch` onto the record at `path`.
    ///
    /// Runs the full cycle - load, merge, stamp `lastUpdated`/`version`/
    /// checksum, conditional write - and re-runs it with backoff when the
    /// conditional write reports a concurrent update. Returns the merged
    /// record as written.
    pub async fn upsert(&self, path: &str, patch: &Value) -> Result<Value, AppError> {
        self.upsert_with(path, |_| Ok(patch.clone())).await
    }

    /// Like [`upsert`](Self::upsert), but derives the patch from the record
    /// as it exists on each attempt. Guards the closure expresses (legal
    /// status transitions, for one) hold against the state that is actually
    /// being replaced: when a concurrent writer forces a retry, the guard
    /// re-runs against the fresh record instead of a stale read.
    pub async fn upsert_with<F>(&self, path: &str, mut make_patch: F) -> Result<Value, AppError>
    where
        F: FnMut(Option<&Value>) -> Result<Value, AppError>,
    {
        for attempt in 0..MAX_UPSERT_ATTEMPTS {
            let existing = self.load(path).await?;
            let patch = make_patch(existing.as_ref().map(|r| &r.value))?;
            let (base, stored_version, legacy_pathname) = match &existing {
                Some(record) => (
                    record.value.clone(),
                    record.value.get(VERSION_FIELD).and_then(|v| v.as_u64()),
                    (record.pathname != path).then(|| record.pathname.clone()),
                ),
                None => (json!({}), None, None),
            };
            // A legacy-path record has no blob at the deterministic key yet,
            // so the write there is a create, whatever version it carried.
            let expected_version = if legacy_pathname.is_some() {
                None
            } else {
                stored_version
            };

            let mut merged = merge_records(&base, &patch);
            merged[VERSION_FIELD] = json!(stored_version.unwrap_or(0) + 1);
            merged[UPDATED_FIELD] = json!(Utc::now().to_rfc3339());
            let checksum = record_checksum(&merged);
            merged[CHECKSUM_FIELD] = json!(checksum);

            // Dates inside the patch are already ISO-8601 text: every
            // chrono field serializes to RFC3339 on the way into Value.
            let body = serde_json::to_string(&merged).map_err(|e| {
                AppError::Persistence(format!("Failed to serialize record: {}", e))
            })?;

            match self
                .blob
                .put_conditional(path, body, "application/json", expected_version)
                .await?
            {
                Some(_) => {
                    if let Some(legacy) = legacy_pathname {
                        // The record now lives at its deterministic key;
                        // drop the legacy blob so the key stays unique.
                        // Not-found on this delete is tolerated.
                        if let Err(e) = self.blob.delete(&legacy).await {
                            tracing::warn!(
                                "Failed to delete legacy blob '{}' after migrating to '{}': {}",
                                legacy,
                                path,
                                e
                            );
                        }
                    }
                    return Ok(merged);
                }
                None => {
                    tracing::warn!(
                        "Concurrent update detected for '{}' (attempt {}/{}), retrying",
                        path,
                        attempt + 1,
                        MAX_UPSERT_ATTEMPTS
                    );
                    tokio::time::sleep(RETRY_BACKOFF * (attempt + 1)).await;
                }
            }
        }
        Err(AppError::Persistence(format!(
            "Gave up writing '{}' after {} conflicting attempts",
            path, MAX_UPSERT_ATTEMPTS
        )))
    }

    /// Allocates the next order sequence for a year through the persisted
    /// per-year counter. The counter record goes through the same CAS path
    /// as every other record, so two concurrent allocations can never hand
    /// out the same sequence.
    pub async fn next_order_sequence(&self, year: i32) -> Result<u32, AppError> {
        let path = counter_path(year);
        for attempt in 0..MAX_UPSERT_ATTEMPTS {
            let existing = self.load(&path).await?;
            let (current, expected_version) = match &existing {
                Some(record) => (
                    record
                        .value
                        .get("sequence")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0),
                    record.value.get(VERSION_FIELD).and_then(|v| v.as_u64()),
                ),
                None => (0, None),
            };
            let next = current + 1;

            let mut counter = json!({
                "year": year,
                "sequence": next,
                "version": expected_version.unwrap_or(0) + 1,
                "lastUpdated": Utc::now().to_rfc3339(),
            });
            let checksum = record_checksum(&counter);
            counter[CHECKSUM_FIELD] = json!(checksum);
            let body = serde_json::to_string(&counter).map_err(|e| {
                AppError::Persistence(format!("Failed to serialize counter: {}", e))
            })?;

            match self
                .blob
                .put_conditional(&path, body, "application/json", expected_version)
                .await?
            {
                Some(_) => return Ok(u32::try_from(next).unwrap_or(u32::MAX)),
                None => {
                    tracing::debug!(
                        "Order counter contention for {} (attempt {}/{})",
                        year,
                        attempt + 1,
                        MAX_UPSERT_ATTEMPTS
                    );
                    tokio::time::sleep(RETRY_BACKOFF * (attempt + 1)).await;
                }
            }
        }
        Err(AppError::Persistence(format!(
            "Gave up allocating order sequence for {} after {} conflicting attempts",
            year, MAX_UPSERT_ATTEMPTS
        )))
    }

    /// Lists and fetches all records under a prefix (a customer's orders).
    pub async fn load_all(&self, prefix: &str) -> Result<Vec<Value>, AppError> {
        let entries = self.blob.list(prefix).await?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.blob.fetch(&entry.url).await? {
                Some(content) => match serde_json::from_str::<Value>(&content) {
                    Ok(value) if verify_checksum(&value) => records.push(value),
                    Ok(_) => {
                        return Err(AppError::Persistence(format!(
                            "Record at '{}' failed checksum verification",
                            entry.pathname
                        )))
                    }
                    Err(e) => {
                        return Err(AppError::Persistence(format!(
                            "Record at '{}' is unreadable: {}",
                            entry.pathname, e
                        )))
                    }
                },
                None => continue,
            }
        }
        Ok(records)
    }

    /// Explicit admin delete. Records are otherwise never removed.
    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        self.blob.delete(path).await
    }
}
