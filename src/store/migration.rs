//! Schema version reconciliation at open time.

use crate::core::{BindError, Result, SchemaVersion};
use crate::handles::{SchemaHandle, StoreHandle};
use crate::store::{Store, StoreConfig, WriteTransaction};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What opening a typed store has to do before it is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenPlan {
    /// Stored schema already matches; nothing is written.
    Attach,
    /// The store never had a schema version; apply the declared one.
    Initialize,
    /// Newer declared version without a callback: reshape tables in place.
    Upgrade,
    /// Newer declared version with a callback registered.
    RunMigration,
    /// Opted-in destructive path: delete the file and start over.
    Recreate,
}

pub(crate) fn plan_open(
    stored: SchemaVersion,
    declared: SchemaVersion,
    schema_matches: bool,
    has_callback: bool,
    delete_if_needed: bool,
) -> Result<OpenPlan> {
    if !stored.is_versioned() {
        if !declared.is_versioned() && schema_matches {
            return Ok(OpenPlan::Attach);
        }
        return Ok(OpenPlan::Initialize);
    }

    // An unversioned declaration against a versioned store goes backwards.
    if !declared.is_versioned() || declared.as_u64() < stored.as_u64() {
        return Err(BindError::Downgrade { stored, declared });
    }

    if declared == stored {
        return if schema_matches {
            Ok(OpenPlan::Attach)
        } else if delete_if_needed && !has_callback {
            Ok(OpenPlan::Recreate)
        } else {
            Err(BindError::MigrationRequired(format!(
                "stored schema differs from the declared schema but both are at version {}",
                stored
            )))
        };
    }

    if has_callback {
        Ok(OpenPlan::RunMigration)
    } else if delete_if_needed {
        Ok(OpenPlan::Recreate)
    } else {
        Ok(OpenPlan::Upgrade)
    }
}

pub(crate) fn open(config: StoreConfig) -> Result<Store> {
    config.validate()?;
    let engine = config.storage_engine();
    let handle = StoreHandle::bind(Arc::clone(&engine), engine.store_open(&config.native())?);

    if config.is_dynamic() {
        return Store::assemble(handle, config);
    }

    let stored = handle.schema_version()?;
    let declared = config.schema_version;
    let schema_matches = handle.schema()?.is_equivalent(&config.schema);
    let plan = plan_open(
        stored,
        declared,
        schema_matches,
        config.migration_callback.is_some(),
        config.delete_if_migration_needed,
    )?;
    debug!(path = ?config.path, %stored, %declared, ?plan, "resolved schema plan");

    if plan != OpenPlan::Attach && config.read_only {
        return Err(BindError::ReadOnly(format!(
            "store {:?} needs a schema update to version {}",
            config.path, declared
        )));
    }

    match plan {
        OpenPlan::Attach => Store::assemble(handle, config),
        OpenPlan::Initialize | OpenPlan::Upgrade => write_schema(handle, config, false),
        OpenPlan::RunMigration => write_schema(handle, config, true),
        OpenPlan::Recreate => {
            warn!(
                path = ?config.path,
                %stored,
                %declared,
                "schema mismatch, deleting and recreating store"
            );
            drop(handle);
            engine.store_delete_files(&config.native())?;
            open(config)
        }
    }
}

/// Writes the declared schema inside one write transaction, running the
/// migration callback before commit when asked to.
fn write_schema(handle: StoreHandle, config: StoreConfig, run_callback: bool) -> Result<Store> {
    let engine = Arc::clone(handle.engine());
    let schema = SchemaHandle::create(Arc::clone(&engine), &config.schema)?;
    engine.store_begin_transaction(handle.raw()?)?;

    // Until the guard below exists, an error drops `handle`, which closes
    // the instance and discards its uncommitted work.
    handle.update_schema(&schema, config.schema_version)?;
    let callback = if run_callback {
        config.migration_callback.clone()
    } else {
        None
    };
    let store = Store::assemble(handle, config)?;

    let transaction = WriteTransaction::adopt(&store);
    if let Some(callback) = callback {
        let old = Store::open(store.config().dynamic_view())?;
        info!(
            path = ?store.config().path,
            from = %old.schema_version()?,
            to = %store.config().schema_version,
            "running migration callback"
        );
        if let Err(e) = callback(&old, &store) {
            warn!(error = %e, "migration callback failed, cancelling");
            if let Err(cancel) = transaction.cancel() {
                warn!(error = %cancel, "failed to cancel migration transaction");
            }
            return Err(BindError::MigrationFailed(Box::new(e)));
        }
    }
    transaction.commit()?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: SchemaVersion = SchemaVersion(1);
    const V2: SchemaVersion = SchemaVersion(2);

    #[test]
    fn test_fresh_store_initializes() {
        let plan = plan_open(SchemaVersion::UNVERSIONED, V1, false, true, false).unwrap();
        assert_eq!(plan, OpenPlan::Initialize);
    }

    #[test]
    fn test_equal_versions() {
        assert_eq!(plan_open(V1, V1, true, true, false).unwrap(), OpenPlan::Attach);
        assert!(matches!(
            plan_open(V1, V1, false, false, false),
            Err(BindError::MigrationRequired(_))
        ));
        assert_eq!(plan_open(V1, V1, false, false, true).unwrap(), OpenPlan::Recreate);
    }

    #[test]
    fn test_downgrade_is_fatal() {
        assert!(matches!(
            plan_open(V2, V1, true, true, true),
            Err(BindError::Downgrade { .. })
        ));
        assert!(matches!(
            plan_open(V2, SchemaVersion::UNVERSIONED, true, false, false),
            Err(BindError::Downgrade { .. })
        ));
    }

    #[test]
    fn test_callback_wins_over_recreate() {
        assert_eq!(plan_open(V1, V2, false, true, true).unwrap(), OpenPlan::RunMigration);
        assert_eq!(plan_open(V1, V2, false, false, true).unwrap(), OpenPlan::Recreate);
        assert_eq!(plan_open(V1, V2, false, false, false).unwrap(), OpenPlan::Upgrade);
        assert!(matches!(
            plan_open(V1, V1, false, true, true),
            Err(BindError::MigrationRequired(_))
        ));
    }
}
