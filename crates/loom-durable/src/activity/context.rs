//! Activity execution context.

/// Context handed to an [`Activity`](super::Activity) on each attempt.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    /// Current attempt number (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    /// The owning workflow's instance id (`workflow_id` from
    /// `loom_core::identity`).
    pub workflow_id: String,
    pub activity_id: String,
}

impl ActivityContext {
    pub fn new(workflow_id: impl Into<String>, activity_id: impl Into<String>, attempt: u32, max_attempts: u32) -> Self {
        Self {
            attempt,
            max_attempts,
            workflow_id: workflow_id.into(),
            activity_id: activity_id.into(),
        }
    }

    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_attempt_detection() {
        let ctx = ActivityContext::new("m::c", "step-1", 3, 3);
        assert!(ctx.is_last_attempt());

        let ctx = ActivityContext::new("m::c", "step-1", 2, 3);
        assert!(!ctx.is_last_attempt());
    }
}
