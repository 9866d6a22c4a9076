//! Reactive event routing
//!
//! Store mutation → [`Dispatcher`] → [`EventHandler`].

pub mod dispatcher;
pub mod mutation;
pub mod subscriber;
pub mod template;

pub use dispatcher::{DispatchOutcome, Dispatcher, EventContext, EventHandler, HandlerOutcome};
pub use mutation::{ChangeKind, MutationEvent};
pub use subscriber::{decode_message, spawn_subscriber_task, OrderedDispatcher};
pub use template::{PathParams, PathTemplate};
