//! # Core Error Types
//!
//! Usage and configuration errors raised by the runtime core.
//!
//! None of these cross the dispatcher or registry boundary as a `Result`:
//! the public operations return definite values (`bool`, `Option`) and route
//! the error into the diagnostic channel (see [`crate::usage`]).

use thiserror::Error;

use crate::schedule::Phase;

/// Errors detected by the runtime core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A dense set was asked to start an enumeration while one was already active.
    #[error("nested enumeration of a dense set that is already being enumerated")]
    NestedEnumeration,

    /// The same registrant was registered twice for a phase.
    #[error("{type_name} is already registered for the {phase} phase in {owner}")]
    AlreadyRegistered {
        /// Concrete type of the registrant.
        type_name: &'static str,
        /// Phase the duplicate registration targeted.
        phase: Phase,
        /// Label of the owning dispatcher.
        owner: String,
    },

    /// A registrant that was never registered was unregistered.
    #[error("{type_name} is not registered in {owner}")]
    NotRegistered {
        /// Concrete type of the registrant.
        type_name: &'static str,
        /// Label of the owning dispatcher.
        owner: String,
    },

    /// A registrant was invoked while it was already borrowed (re-entrant callback).
    #[error("{type_name} is already running a callback; skipped re-entrant {phase} call")]
    ReentrantCallback {
        /// Concrete type of the registrant.
        type_name: &'static str,
        /// Phase that attempted the re-entrant call.
        phase: Phase,
    },

    /// A phase was run again from inside its own dispatch.
    #[error("{phase} phase of {owner} is already running; skipped nested run")]
    NestedPhase {
        /// The phase that was already running.
        phase: Phase,
        /// Label of the owning dispatcher.
        owner: String,
    },

    /// A type appeared more than once in a declared order.
    #[error("duplicate type {type_name} in declared order of {owner}; keeping the first entry")]
    DuplicateDeclaredType {
        /// The duplicated type.
        type_name: &'static str,
        /// Label of the owner of the declared order.
        owner: String,
    },

    /// A service was asked to construct while an instance already exists.
    #[error("unable to create service {type_name}: an instance already exists")]
    ServiceAlreadyLive {
        /// The service type.
        type_name: &'static str,
    },

    /// An event listener was notified while it was already running.
    #[error("event listener {subscription} is already running; skipped re-entrant notification")]
    ReentrantListener {
        /// Raw subscription id of the listener.
        subscription: u64,
    },

    /// A service could not be borrowed for a lifecycle hook.
    #[error("service {type_name} is busy; skipped {hook}")]
    ServiceBusy {
        /// The service type.
        type_name: &'static str,
        /// The hook that was skipped.
        hook: &'static str,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
