//! Zoned: execution-context propagation
//!
//! A zone is an execution context that follows work across asynchronous
//! hops. Code running in a zone sees its properties and hooks; callbacks
//! handed to intercepted host entry points (timers, event listeners,
//! observers, continuations) re-enter the zone that registered them, and
//! each zone tracks how many such registrations are still outstanding.
//!
//! ```no_run
//! use zoned::{zone, ZoneSpec};
//!
//! let request = zone::current().fork(ZoneSpec::new().property("request_id", 42));
//! request
//!     .run(|| {
//!         assert_eq!(zone::current().property::<u64>("request_id"), Some(42));
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

pub mod adapters;
pub mod config;
pub mod continuation;
pub mod error;
pub mod host;
pub mod install;
pub mod interception;
pub mod logging;
pub mod zone;

pub use config::{ConfigLoader, ZonedConfig};
pub use continuation::bind_promise_fn;
pub use error::{EngineError, ZoneError};
pub use install::install;
pub use zone::{bind, bind_in_child, current, fork, PendingTask, Zone, ZoneId, ZoneSpec};
