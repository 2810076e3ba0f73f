//! Cursor-driven paginated scan
//!
//! Walks one collection in natural key order: skip `page.skip` records with a
//! single advance, then collect up to `page.limit` records one step at a
//! time. The window is returned whole once collection stops.

use serde_json::Value;

use crate::config::Page;
use crate::engine::{Connection, Cursor};
use crate::error::{StoreError, StoreResult};

/// Collect the records in `page` from `store`.
///
/// Running out of records early yields a short result, not an error. Any
/// failure while stepping aborts the scan with `StoreError::Cursor`.
pub async fn scan<C: Connection>(conn: &C, store: &str, page: Page) -> StoreResult<Vec<Value>> {
    if page.limit == 0 {
        return Ok(Vec::new());
    }

    let Some(mut cursor) = conn.open_cursor(store).await? else {
        return Ok(Vec::new());
    };

    // Zero skip starts at the first record; engines may reject advance(0).
    if page.skip > 0 && !cursor.advance(page.skip).await.map_err(into_cursor_error)? {
        return Ok(Vec::new());
    }

    let limit = page.limit as usize;
    let mut records = Vec::with_capacity(limit.min(64));
    loop {
        records.push(cursor.value().map_err(into_cursor_error)?);
        if records.len() >= limit {
            break;
        }
        if !cursor.continue_().await.map_err(into_cursor_error)? {
            break;
        }
    }

    Ok(records)
}

fn into_cursor_error(err: StoreError) -> StoreError {
    match err {
        StoreError::Request(msg) => StoreError::Cursor(msg),
        other => other,
    }
}
