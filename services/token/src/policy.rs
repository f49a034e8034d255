//! Access policy seam. Only the verdict is consumed here.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BackendError;
use crate::models::{Application, User};

/// Verdict of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyResult {
    pub passing: bool,
    pub messages: Vec<String>,
}

impl PolicyResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passing: true,
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            passing: false,
            messages: vec![message.into()],
        }
    }
}

#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Decides whether `user` may access `application`.
    async fn evaluate(
        &self,
        application: &Application,
        user: &User,
    ) -> Result<PolicyResult, BackendError>;
}

/// Returns the same verdict for every request.
#[derive(Debug, Clone)]
pub struct StaticPolicy(PolicyResult);

impl StaticPolicy {
    #[must_use]
    pub const fn allow() -> Self {
        Self(PolicyResult::pass())
    }

    #[must_use]
    pub fn deny(message: impl Into<String>) -> Self {
        Self(PolicyResult::deny(message))
    }
}

#[async_trait]
impl PolicyEngine for StaticPolicy {
    async fn evaluate(
        &self,
        _application: &Application,
        _user: &User,
    ) -> Result<PolicyResult, BackendError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(PolicyResult::pass()).unwrap();
        assert_eq!(json, serde_json::json!({"passing": true, "messages": []}));
    }

    #[tokio::test]
    async fn test_static_policy() {
        let app = Application::new("app", None);
        let user = User::new("bot");
        assert!(StaticPolicy::allow().evaluate(&app, &user).await.unwrap().passing);

        let verdict = StaticPolicy::deny("no").evaluate(&app, &user).await.unwrap();
        assert!(!verdict.passing);
        assert_eq!(verdict.messages, vec!["no".to_string()]);
    }
}
