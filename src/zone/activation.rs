//! The per-thread "active zone" slot.
//!
//! Only `Zone::run` creates an [`Activation`]; dropping it restores whatever
//! was active before, on normal return and while unwinding alike. Nothing
//! else in the crate writes the slot.

use crate::zone::Zone;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    // `None` means the root zone.
    static ACTIVE: RefCell<Option<Arc<Zone>>> = const { RefCell::new(None) };
}

pub(crate) fn current() -> Arc<Zone> {
    ACTIVE
        .with(|active| active.borrow().clone())
        .unwrap_or_else(|| Arc::clone(Zone::root()))
}

/// Scoped activation of one zone on the current thread
pub(crate) struct Activation {
    previous: Option<Arc<Zone>>,
    // Restoring must happen on the thread that entered.
    _not_send: PhantomData<*const ()>,
}

impl Activation {
    pub(crate) fn enter(zone: Arc<Zone>) -> Self {
        let previous = ACTIVE.with(|active| active.replace(Some(zone)));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|active| *active.borrow_mut() = previous);
    }
}
