//! Event dispatcher
//!
//! Matches a mutation's document path against registered templates, picks
//! the one handler subscribed to that template and change kind, and
//! supervises the call. Handler errors and panics are logged with the
//! handler name and document path and never propagate to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::db::DocPath;
use crate::events::mutation::{ChangeKind, MutationEvent};
use crate::events::template::{PathParams, PathTemplate};
use crate::types::{HearthError, Result};

/// Everything a handler gets for one mutation
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event_id: String,
    pub path: DocPath,
    pub params: PathParams,
    pub kind: ChangeKind,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

/// What a handler did with an event it accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// State was written or a notification was sent
    Applied,
    /// Nothing to do (no-op transition, duplicate delivery, missing data)
    Skipped(String),
}

impl HandlerOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

/// A reactive handler bound to one path template
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in logs
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &EventContext) -> Result<HandlerOutcome>;
}

/// Result of dispatching one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled {
        handler: &'static str,
        outcome: HandlerOutcome,
    },
    /// No route for this path and change kind
    Ignored,
    Failed {
        handler: &'static str,
        error: String,
    },
}

struct Route {
    template: PathTemplate,
    kinds: Vec<ChangeKind>,
    handler: Arc<dyn EventHandler>,
}

/// Routes mutations to handlers
#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a template and set of change kinds
    ///
    /// A template and kind pair can be claimed by only one handler.
    pub fn route(
        mut self,
        template: &str,
        kinds: &[ChangeKind],
        handler: Arc<dyn EventHandler>,
    ) -> Result<Self> {
        let template = PathTemplate::parse(template)?;

        for route in self.routes.iter().filter(|r| r.template == template) {
            if let Some(kind) = kinds.iter().find(|k| route.kinds.contains(k)) {
                return Err(HearthError::Config(format!(
                    "{} on {} already routed to {}",
                    kind,
                    template,
                    route.handler.name()
                )));
            }
        }

        info!(
            handler = handler.name(),
            template = %template,
            kinds = ?kinds,
            "Registered event route"
        );
        self.routes.push(Route {
            template,
            kinds: kinds.to_vec(),
            handler,
        });
        Ok(self)
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn resolve(&self, path: &str, kind: ChangeKind) -> Option<(&Route, PathParams)> {
        self.routes.iter().find_map(|route| {
            if !route.kinds.contains(&kind) {
                return None;
            }
            route.template.matches(path).map(|params| (route, params))
        })
    }

    /// Dispatch one mutation to its handler
    pub async fn dispatch(&self, event: MutationEvent) -> DispatchOutcome {
        let Some(kind) = event.kind() else {
            debug!(event_id = %event.event_id, document = %event.document, "Event has no state, ignoring");
            return DispatchOutcome::Ignored;
        };

        let Some((route, params)) = self.resolve(&event.document, kind) else {
            debug!(
                event_id = %event.event_id,
                document = %event.document,
                kind = %kind,
                "No route for event"
            );
            return DispatchOutcome::Ignored;
        };

        let handler_name = route.handler.name();
        let path = match event.path() {
            Ok(path) => path,
            Err(e) => {
                warn!(handler = handler_name, document = %event.document, "Bad document path: {}", e);
                return DispatchOutcome::Failed {
                    handler: handler_name,
                    error: e.to_string(),
                };
            }
        };

        let ctx = EventContext {
            event_id: event.event_id,
            path,
            params,
            kind,
            before: event.before,
            after: event.after,
        };

        // Run on its own task so a panicking handler surfaces as a JoinError
        let handler = Arc::clone(&route.handler);
        let document = ctx.path.to_string();
        let event_id = ctx.event_id.clone();
        let joined = tokio::spawn(async move { handler.handle(&ctx).await }).await;

        match joined {
            Ok(Ok(outcome)) => {
                match &outcome {
                    HandlerOutcome::Applied => {
                        debug!(handler = handler_name, document = %document, event_id = %event_id, "Handler applied event")
                    }
                    HandlerOutcome::Skipped(reason) => {
                        debug!(handler = handler_name, document = %document, event_id = %event_id, reason = %reason, "Handler skipped event")
                    }
                }
                DispatchOutcome::Handled {
                    handler: handler_name,
                    outcome,
                }
            }
            Ok(Err(e)) => {
                error!(
                    handler = handler_name,
                    document = %document,
                    event_id = %event_id,
                    "Handler failed: {}",
                    e
                );
                DispatchOutcome::Failed {
                    handler: handler_name,
                    error: e.to_string(),
                }
            }
            Err(join_error) => {
                error!(
                    handler = handler_name,
                    document = %document,
                    event_id = %event_id,
                    "Handler task aborted: {}",
                    join_error
                );
                DispatchOutcome::Failed {
                    handler: handler_name,
                    error: join_error.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, ctx: &EventContext) -> Result<HandlerOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(ctx.params.get("userId"), Some("u1"));
            Ok(HandlerOutcome::Applied)
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _ctx: &EventContext) -> Result<HandlerOutcome> {
            Err(HearthError::Database("store offline".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventHandler for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn handle(&self, _ctx: &EventContext) -> Result<HandlerOutcome> {
            panic!("handler bug");
        }
    }

    #[tokio::test]
    async fn test_routes_by_template_and_kind() {
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new()
            .route("profiles/{userId}", &[ChangeKind::Create], counting.clone())
            .unwrap();

        let outcome = dispatcher
            .dispatch(MutationEvent::created("profiles/u1", json!({})))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                handler: "counting",
                outcome: HandlerOutcome::Applied
            }
        );

        // Unsubscribed kind and unmatched template
        let outcome = dispatcher
            .dispatch(MutationEvent::updated("profiles/u1", json!({}), json!({})))
            .await;
        assert_eq!(outcome, DispatchOutcome::Ignored);
        let outcome = dispatcher
            .dispatch(MutationEvent::created("users/u1", json!({})))
            .await;
        assert_eq!(outcome, DispatchOutcome::Ignored);

        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let dispatcher = Dispatcher::new()
            .route("a/{id}", &[ChangeKind::Create], Arc::new(Failing))
            .unwrap()
            .route("b/{id}", &[ChangeKind::Create], Arc::new(Panicking))
            .unwrap();

        let outcome = dispatcher.dispatch(MutationEvent::created("a/1", json!({}))).await;
        assert!(matches!(outcome, DispatchOutcome::Failed { handler: "failing", .. }));

        let outcome = dispatcher.dispatch(MutationEvent::created("b/1", json!({}))).await;
        assert!(matches!(outcome, DispatchOutcome::Failed { handler: "panicking", .. }));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let result = Dispatcher::new()
            .route("a/{id}", &[ChangeKind::Create, ChangeKind::Update], Arc::new(Failing))
            .unwrap()
            .route("a/{id}", &[ChangeKind::Update], Arc::new(Panicking));
        assert!(result.is_err());
    }
}
