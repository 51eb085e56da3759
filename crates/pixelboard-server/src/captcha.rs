//! CAPTCHA admission for placements.
//!
//! [`CaptchaVerifier`] is the seam the pipeline calls through;
//! [`RecaptchaClient`] is the production implementation against Google's
//! siteverify endpoint, and [`StaticVerifier`] is a stub for tests and
//! local development.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Verification attempts before giving up.
pub const VERIFY_ATTEMPTS: u32 = 5;

/// Fixed delay between verification attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Errors from CAPTCHA verification.
#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    /// The provider rejected the token. Not retryable.
    #[error("invalid recaptcha token")]
    Rejected,

    /// The provider could not be reached or answered garbage. Retryable.
    #[error("captcha transport error: {0}")]
    Transport(String),

    /// Every attempt failed on transport.
    #[error("captcha verification gave up after {0} attempts")]
    RetriesExhausted(u32),
}

/// A placement admission check.
pub trait CaptchaVerifier: Send + Sync + 'static {
    /// Verify a client token, with the client IP as corroborating signal.
    fn verify(
        &self,
        token: &str,
        client_ip: &str,
    ) -> impl Future<Output = Result<(), CaptchaError>> + Send;
}

/// Verifier backed by the reCAPTCHA siteverify API.
///
/// Transport failures are retried up to [`VERIFY_ATTEMPTS`] times with a
/// fixed delay; a provider rejection is final on the first answer.
#[derive(Debug, Clone)]
pub struct RecaptchaClient {
    client: reqwest::Client,
    secret: String,
    endpoint: String,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl RecaptchaClient {
    /// Create a verifier with the given shared secret.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret,
            endpoint: String::from(SITEVERIFY_URL),
            retry_delay: RETRY_DELAY,
        }
    }

    /// Override the verification endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Override the delay between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn send_verify(&self, token: &str, client_ip: &str) -> Result<bool, CaptchaError> {
        let params = [
            ("secret", self.secret.as_str()),
            ("response", token),
            ("remoteip", client_ip),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| CaptchaError::Transport(e.to_string()))?;

        let verdict: SiteverifyResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::Transport(e.to_string()))?;

        Ok(verdict.success && verdict.error_codes.is_empty())
    }
}

impl CaptchaVerifier for RecaptchaClient {
    async fn verify(&self, token: &str, client_ip: &str) -> Result<(), CaptchaError> {
        if token.is_empty() {
            return Err(CaptchaError::Rejected);
        }

        for attempt in 0..VERIFY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.send_verify(token, client_ip).await {
                Ok(true) => return Ok(()),
                // A definitive provider answer is never retried.
                Ok(false) => return Err(CaptchaError::Rejected),
                Err(err) => {
                    warn!(attempt, error = %err, "captcha verification attempt failed");
                }
            }
        }

        Err(CaptchaError::RetriesExhausted(VERIFY_ATTEMPTS))
    }
}

/// Stub verifier: accepts any non-empty token not on its reject list.
#[derive(Debug, Clone, Default)]
pub struct StaticVerifier {
    rejected: Vec<String>,
}

impl StaticVerifier {
    /// A verifier that accepts every non-empty token.
    #[must_use]
    pub const fn accepting_all() -> Self {
        Self {
            rejected: Vec::new(),
        }
    }

    /// A verifier that rejects exactly the given tokens.
    #[must_use]
    pub fn rejecting<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            rejected: tokens.into_iter().collect(),
        }
    }
}

impl CaptchaVerifier for StaticVerifier {
    async fn verify(&self, token: &str, _client_ip: &str) -> Result<(), CaptchaError> {
        if token.is_empty() || self.rejected.iter().any(|t| t == token) {
            return Err(CaptchaError::Rejected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn static_verifier_accepts_and_rejects() {
        let verifier = StaticVerifier::rejecting([String::from("invalid-token")]);
        assert!(verifier.verify("test-token", "1.2.3.4").await.is_ok());
        assert!(matches!(
            verifier.verify("invalid-token", "1.2.3.4").await,
            Err(CaptchaError::Rejected)
        ));
        assert!(matches!(
            verifier.verify("", "1.2.3.4").await,
            Err(CaptchaError::Rejected)
        ));
    }

    /// Serve `router` on an ephemeral port, returning its base URL.
    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/verify")
    }

    fn fast_client(endpoint: String) -> RecaptchaClient {
        RecaptchaClient::new(String::from("secret"))
            .with_endpoint(endpoint)
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn provider_rejection_is_not_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/verify",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(serde_json::json!({"success": false})) }
            }),
        );

        let client = fast_client(serve(router).await);
        let result = client.verify("some-token", "1.2.3.4").await;

        assert!(matches!(result, Err(CaptchaError::Rejected)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_retried_until_exhausted() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        // Non-JSON responses count as transport failures.
        let router = Router::new().route(
            "/verify",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "not json" }
            }),
        );

        let client = fast_client(serve(router).await);
        let result = client.verify("some-token", "1.2.3.4").await;

        assert!(matches!(result, Err(CaptchaError::RetriesExhausted(_))));
        assert_eq!(hits.load(Ordering::SeqCst), VERIFY_ATTEMPTS);
    }

    #[tokio::test]
    async fn recovers_after_flaky_attempts() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/verify",
            post(move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        String::from("not json")
                    } else {
                        serde_json::json!({"success": true}).to_string()
                    }
                }
            }),
        );

        let client = fast_client(serve(router).await);
        assert!(client.verify("some-token", "1.2.3.4").await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_token_rejected_without_calling_provider() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/verify",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(serde_json::json!({"success": true})) }
            }),
        );

        let client = fast_client(serve(router).await);
        assert!(matches!(
            client.verify("", "1.2.3.4").await,
            Err(CaptchaError::Rejected)
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
