//! Activity registry for type-erased, locally-executed activities.
//!
//! Loom has no distributed worker pool: activities registered here run
//! synchronously, in-process, when the executor encounters a
//! `ScheduleActivity` action (see [`WorkflowExecutor`](super::WorkflowExecutor)).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::activity::{Activity, ActivityContext, ActivityError};

#[async_trait]
pub trait AnyActivity: Send + Sync {
    async fn execute(&self, ctx: &ActivityContext, input: Value) -> Result<Value, ActivityError>;
}

struct ActivityWrapper<A: Activity> {
    inner: A,
}

#[async_trait]
impl<A: Activity> AnyActivity for ActivityWrapper<A> {
    async fn execute(&self, ctx: &ActivityContext, input: Value) -> Result<Value, ActivityError> {
        let typed_input: A::Input = serde_json::from_value(input)
            .map_err(|e| ActivityError::non_retryable(format!("invalid activity input: {e}")))?;

        let output = self.inner.execute(ctx, typed_input).await?;

        serde_json::to_value(output)
            .map_err(|e| ActivityError::non_retryable(format!("invalid activity output: {e}")))
    }
}

/// Maps activity type names to their handlers.
pub struct ActivityRegistry {
    handlers: HashMap<String, Box<dyn AnyActivity>>,
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<A: Activity>(&mut self, activity: A) {
        self.handlers
            .insert(A::TYPE.to_string(), Box::new(ActivityWrapper { inner: activity }));
    }

    pub fn contains(&self, activity_type: &str) -> bool {
        self.handlers.contains_key(activity_type)
    }

    pub fn get(&self, activity_type: &str) -> Option<&dyn AnyActivity> {
        self.handlers.get(activity_type).map(|b| b.as_ref())
    }
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activity_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Input {
        n: i32,
    }

    #[derive(Serialize, Deserialize)]
    struct Output {
        doubled: i32,
    }

    struct DoubleActivity;

    #[async_trait]
    impl Activity for DoubleActivity {
        const TYPE: &'static str = "double";
        type Input = Input;
        type Output = Output;

        async fn execute(&self, _ctx: &ActivityContext, input: Input) -> Result<Output, ActivityError> {
            Ok(Output { doubled: input.n * 2 })
        }
    }

    #[tokio::test]
    async fn registered_activity_executes_through_wrapper() {
        let mut registry = ActivityRegistry::new();
        registry.register(DoubleActivity);

        assert!(registry.contains("double"));
        let handler = registry.get("double").unwrap();
        let ctx = ActivityContext::new("m::c", "step-1", 1, 3);
        let result = handler
            .execute(&ctx, serde_json::json!({ "n": 21 }))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({ "doubled": 42 }));
    }

    #[tokio::test]
    async fn unregistered_type_is_absent() {
        let registry = ActivityRegistry::new();
        assert!(registry.get("missing").is_none());
    }
}
