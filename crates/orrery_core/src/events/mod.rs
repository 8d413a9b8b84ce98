//! # Events
//!
//! Kind-keyed publish/subscribe with unsubscribe-during-notification safety.

mod bus;

pub use bus::{EventBus, EventContext, SubscriptionId};
