//! Shared single-threaded handle to a history.
//!
//! Several collaborators (editors, observers, export) hold the same history.
//! Operations never interleave: a call made while another is still running,
//! for example from inside a change notification, fails with
//! [`HistoryError::Busy`] instead of queueing.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use flicksy_bundle::{Bundle, DecodedBundle};

use crate::manager::{HistoryError, HistoryManager};
use crate::manifest::Manifest;
use crate::observer::{Change, SubscriptionId};

pub struct SharedHistory<T, M> {
    inner: Rc<RefCell<HistoryManager<T, M>>>,
}

/// Non-owning handle, for observers that need to call back into the history.
pub struct WeakHistory<T, M> {
    inner: Weak<RefCell<HistoryManager<T, M>>>,
}

impl<T, M> Clone for SharedHistory<T, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, M> Clone for WeakHistory<T, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T, M> WeakHistory<T, M> {
    pub fn upgrade(&self) -> Option<SharedHistory<T, M>> {
        self.inner.upgrade().map(|inner| SharedHistory { inner })
    }
}

impl<T: Clone, M: Manifest<T>> SharedHistory<T, M> {
    pub fn new(manager: HistoryManager<T, M>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(manager)),
        }
    }

    pub fn downgrade(&self) -> WeakHistory<T, M> {
        WeakHistory {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn load_bundle(&self, bundle: DecodedBundle<T>) -> Result<(), HistoryError> {
        self.write()?.load_bundle(bundle)
    }

    pub fn load_portable(&self, bundle: Bundle<T>) -> Result<(), HistoryError> {
        self.write()?.load_portable(bundle)
    }

    pub fn make_checkpoint(&self) -> Result<(), HistoryError> {
        self.write()?.make_checkpoint()
    }

    pub fn undo(&self) -> Result<bool, HistoryError> {
        Ok(self.write()?.undo())
    }

    pub fn redo(&self) -> Result<bool, HistoryError> {
        Ok(self.write()?.redo())
    }

    pub fn changed(&self) -> Result<(), HistoryError> {
        self.write()?.changed();
        Ok(())
    }

    pub fn can_undo(&self) -> Result<bool, HistoryError> {
        Ok(self.read()?.can_undo())
    }

    pub fn can_redo(&self) -> Result<bool, HistoryError> {
        Ok(self.read()?.can_redo())
    }

    pub fn make_bundle(&self) -> Result<Bundle<T>, HistoryError> {
        self.read()?.make_bundle()
    }

    /// Read the present project. `Ok(None)` when nothing is loaded.
    pub fn with_present<R>(&self, f: impl FnOnce(&T) -> R) -> Result<Option<R>, HistoryError> {
        Ok(self.read()?.present().map(f))
    }

    /// Run an arbitrary edit against the manager with exclusive access.
    pub fn edit<R>(
        &self,
        f: impl FnOnce(&mut HistoryManager<T, M>) -> R,
    ) -> Result<R, HistoryError> {
        let mut manager = self.write()?;
        Ok(f(&mut *manager))
    }

    pub fn subscribe(
        &self,
        callback: impl FnMut(&Change, &T) + 'static,
    ) -> Result<SubscriptionId, HistoryError> {
        Ok(self.write()?.subscribe(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, HistoryError> {
        Ok(self.write()?.unsubscribe(id))
    }

    fn read(&self) -> Result<Ref<'_, HistoryManager<T, M>>, HistoryError> {
        self.inner.try_borrow().map_err(|_| busy())
    }

    fn write(&self) -> Result<RefMut<'_, HistoryManager<T, M>>, HistoryError> {
        self.inner.try_borrow_mut().map_err(|_| busy())
    }
}

fn busy() -> HistoryError {
    tracing::warn!("overlapping history operation rejected");
    HistoryError::Busy
}
