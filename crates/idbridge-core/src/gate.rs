//! Operation gate
//!
//! Every record operation passes through [`check`] before it touches the
//! engine. The check is synchronous and opens no transaction.

use crate::cell::HandleCell;
use crate::error::{StoreError, StoreResult};

/// Return the ready handle, or `StoreError::NotInitialized` if there is none.
pub fn check<H: Clone>(cell: &HandleCell<H>) -> StoreResult<H> {
    cell.current().ok_or(StoreError::NotInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_closed_without_handle() {
        let cell: HandleCell<u32> = HandleCell::new();
        assert_eq!(check(&cell), Err(StoreError::NotInitialized));
    }

    #[test]
    fn test_gate_open_with_handle() {
        let cell = HandleCell::new();
        cell.publish(3u32);
        assert_eq!(check(&cell), Ok(3));
    }
}
