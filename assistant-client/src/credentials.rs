use log::{debug, info};

use crate::api::AssistantApi;
use crate::error::{PlanError, Result};
use crate::session::SessionState;

/// Check that `candidate` authorizes calls, and record it in the session if so.
///
/// `api` must be a client authenticated with `candidate`. An empty key is
/// invalid without touching the network (`Ok(false)`); any failure of the
/// probe call is reported as [`PlanError::InvalidCredential`] whatever its cause.
pub async fn validate_api_key<A: AssistantApi + ?Sized>(
    api: &A,
    candidate: &str,
    session: &mut SessionState,
) -> Result<bool> {
    if candidate.is_empty() {
        return Ok(false);
    }

    match api.list_models().await {
        Ok(models) => {
            debug!("{} lists {} model(s)", api.name(), models.len());
            session.api_key = Some(candidate.to_string());
            info!("API key accepted by {}", api.name());
            Ok(true)
        }
        Err(source) => Err(PlanError::InvalidCredential { source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::providers::MockAssistantApi;

    #[tokio::test]
    async fn test_empty_key_makes_no_call() {
        let api = MockAssistantApi::new();
        let mut session = SessionState::new();

        assert!(!validate_api_key(&api, "", &mut session).await.unwrap());
        assert_eq!(api.total_calls(), 0);
        assert!(session.api_key.is_none());
    }

    #[tokio::test]
    async fn test_valid_key_is_recorded() {
        let api = MockAssistantApi::new();
        let mut session = SessionState::new();

        assert!(validate_api_key(&api, "sk-good", &mut session).await.unwrap());
        assert_eq!(api.call_count("list_models"), 1);
        assert_eq!(session.api_key.as_deref(), Some("sk-good"));
    }

    #[tokio::test]
    async fn test_any_failure_is_invalid_credential() {
        for error in [
            ApiError::Status {
                status_code: 401,
                message: "Incorrect API key provided".to_string(),
            },
            ApiError::RateLimited { retry_after: None },
            ApiError::Transport("dns error".to_string()),
        ] {
            let api = MockAssistantApi::new().fail_on("list_models", error);
            let mut session = SessionState::new();

            let err = validate_api_key(&api, "sk-bad", &mut session)
                .await
                .unwrap_err();
            assert!(matches!(err, PlanError::InvalidCredential { .. }));
            assert_eq!(err.to_string(), "Invalid API Key");
            assert!(session.api_key.is_none());
        }
    }
}
