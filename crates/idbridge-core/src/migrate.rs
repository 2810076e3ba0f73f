//! Schema migration run inside the engine's upgrade transaction
//!
//! The engine decides *when* an upgrade is needed (requested version above
//! the stored one) and calls [`UpgradeHook::run`] from inside its upgrade
//! transaction. The hook decides *what* to do: create every collection in the
//! schema that does not exist yet.

use std::rc::Rc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::{SchemaDescriptor, StoreConfig};
use crate::engine::{UpgradeTransaction, VersionChange};
use crate::error::{StoreError, StoreResult};
use crate::state::InitState;

/// Migration callback handed to [`crate::engine::Backend::open`].
///
/// Cheap to clone so engines can move it into a `'static` callback.
#[derive(Debug, Clone)]
pub struct UpgradeHook {
    schema: Rc<SchemaDescriptor>,
    state: Option<Rc<watch::Sender<InitState>>>,
}

impl UpgradeHook {
    pub fn new(schema: SchemaDescriptor) -> Self {
        Self {
            schema: Rc::new(schema),
            state: None,
        }
    }

    /// Report `MigrationNeeded` and `Migrating` transitions to `state`.
    pub(crate) fn with_state(mut self, state: Rc<watch::Sender<InitState>>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Apply the schema. Returns the names of the collections created.
    ///
    /// The state reads `MigrationNeeded` while the missing collections are
    /// worked out, then `Migrating` while they are created.
    pub fn run(
        &self,
        tx: &mut dyn UpgradeTransaction,
        change: VersionChange,
    ) -> StoreResult<Vec<String>> {
        self.transition(InitState::MigrationNeeded(change));
        let missing = missing_stores(&self.schema, tx);
        self.transition(InitState::Migrating(change));
        create_stores(&missing, tx)
    }

    fn transition(&self, next: InitState) {
        if let Some(state) = &self.state {
            state.send_replace(next);
        }
    }
}

/// Create every collection in `schema` that `tx` does not already have.
///
/// A collection that turns out to exist already is skipped, so re-running
/// after partial completion never fails the whole migration.
pub fn apply(schema: &SchemaDescriptor, tx: &mut dyn UpgradeTransaction) -> StoreResult<Vec<String>> {
    let missing = missing_stores(schema, tx);
    create_stores(&missing, tx)
}

fn missing_stores<'a>(
    schema: &'a SchemaDescriptor,
    tx: &dyn UpgradeTransaction,
) -> Vec<&'a StoreConfig> {
    let existing = tx.store_names();
    schema
        .stores()
        .iter()
        .filter(|store| {
            let exists = existing.iter().any(|name| name == &store.name);
            if exists {
                debug!(store = %store.name, "collection already exists, skipping");
            }
            !exists
        })
        .collect()
}

fn create_stores(
    stores: &[&StoreConfig],
    tx: &mut dyn UpgradeTransaction,
) -> StoreResult<Vec<String>> {
    let mut created = Vec::new();
    for store in stores {
        match tx.create_store(&store.name, &store.key_path) {
            Ok(()) => {
                debug!(store = %store.name, key_path = %store.key_path, "created collection");
                created.push(store.name.clone());
            }
            Err(StoreError::ConstraintViolation(msg)) => {
                warn!(store = %store.name, %msg, "collection appeared during migration, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeUpgrade {
        stores: Vec<(String, String)>,
        /// Names that report "already exists" even though store_names() omits them
        hidden: Vec<String>,
        fail_on: Option<String>,
        /// Client state sampled on every call, when watched
        state: Option<watch::Receiver<InitState>>,
        seen: std::cell::RefCell<Vec<InitState>>,
    }

    impl FakeUpgrade {
        fn sample(&self) {
            if let Some(state) = &self.state {
                self.seen.borrow_mut().push(state.borrow().clone());
            }
        }
    }

    impl UpgradeTransaction for FakeUpgrade {
        fn store_names(&self) -> Vec<String> {
            self.sample();
            self.stores.iter().map(|(n, _)| n.clone()).collect()
        }

        fn create_store(&mut self, name: &str, key_path: &str) -> StoreResult<()> {
            self.sample();
            if self.fail_on.as_deref() == Some(name) {
                return Err(StoreError::Connection(format!("cannot create {}", name)));
            }
            if self.hidden.iter().any(|h| h == name) || self.stores.iter().any(|(n, _)| n == name)
            {
                return Err(StoreError::ConstraintViolation(format!("{} exists", name)));
            }
            self.stores.push((name.to_string(), key_path.to_string()));
            Ok(())
        }
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(vec![
            StoreConfig::new("users", "id"),
            StoreConfig::new("orders", "orderId"),
        ])
        .unwrap()
    }

    #[test]
    fn test_apply_creates_missing_only() {
        let mut tx = FakeUpgrade {
            stores: vec![("users".into(), "id".into())],
            ..Default::default()
        };
        let created = apply(&schema(), &mut tx).unwrap();
        assert_eq!(created, vec!["orders".to_string()]);
        assert_eq!(tx.store_names(), vec!["users", "orders"]);
    }

    #[test]
    fn test_apply_tolerates_existing_collection() {
        let mut tx = FakeUpgrade {
            hidden: vec!["users".into()],
            ..Default::default()
        };
        let created = apply(&schema(), &mut tx).unwrap();
        assert_eq!(created, vec!["orders".to_string()]);
    }

    #[test]
    fn test_apply_propagates_engine_failure() {
        let mut tx = FakeUpgrade {
            fail_on: Some("orders".into()),
            ..Default::default()
        };
        let err = apply(&schema(), &mut tx).unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn test_hook_reports_transitions() {
        let (tx_state, rx_state) = watch::channel(InitState::Opening);
        let hook = UpgradeHook::new(schema()).with_state(Rc::new(tx_state));
        let change = VersionChange {
            old_version: 0,
            new_version: 1,
        };

        let mut tx = FakeUpgrade {
            state: Some(rx_state.clone()),
            ..Default::default()
        };
        hook.run(&mut tx, change).unwrap();

        // Listing existing collections happens under MigrationNeeded, each
        // creation under Migrating
        assert_eq!(
            *tx.seen.borrow(),
            vec![
                InitState::MigrationNeeded(change),
                InitState::Migrating(change),
                InitState::Migrating(change),
            ]
        );
        assert_eq!(*rx_state.borrow(), InitState::Migrating(change));
    }
}
