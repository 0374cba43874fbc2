use crate::core::Result;
use crate::store::Store;
use tracing::{debug, warn};

/// An open write transaction on one store instance.
///
/// Dropping the guard without calling [`commit`](Self::commit) cancels the
/// transaction, so an early return or a panic never leaves it open.
pub struct WriteTransaction<'a> {
    store: &'a Store,
    finished: bool,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn begin(store: &'a Store) -> Result<Self> {
        let raw = store.handle().raw()?;
        store.handle().engine().store_begin_transaction(raw)?;
        Ok(Self::adopt(store))
    }

    /// Takes ownership of a transaction that is already open.
    pub(crate) fn adopt(store: &'a Store) -> Self {
        Self {
            store,
            finished: false,
        }
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let raw = self.store.handle().raw()?;
        self.store.handle().engine().store_commit_transaction(raw)?;
        debug!(path = ?self.store.config().path, "write transaction committed");
        Ok(())
    }

    pub fn cancel(mut self) -> Result<()> {
        self.finished = true;
        self.rollback()
    }

    fn rollback(&self) -> Result<()> {
        let raw = self.store.handle().raw()?;
        self.store.handle().engine().store_cancel_transaction(raw)?;
        debug!(path = ?self.store.config().path, "write transaction cancelled");
        Ok(())
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.rollback() {
            warn!(error = %e, "failed to cancel abandoned write transaction");
        }
    }
}
