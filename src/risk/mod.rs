//! Visitor risk assessment for the anonymous subscribe and contact surfaces.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::RiskConfig;
use crate::error::{AppError, Result};

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Scores a request before the system acts on it. `Ok(false)` means the
/// caller should reject the request; `Err` means the assessment itself
/// could not be performed.
#[async_trait]
pub trait RiskAssessor: Send + Sync {
    async fn assess(&self, token: &str, hostname: &str, client_ip: Option<&str>) -> Result<bool>;
}

/// Accepts every visitor. Used when no verification secret is configured,
/// which is the expected state for local development.
pub struct AllowAllRiskAssessor;

#[async_trait]
impl RiskAssessor for AllowAllRiskAssessor {
    async fn assess(&self, _token: &str, _hostname: &str, _client_ip: Option<&str>) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    hostname: Option<String>,
}

/// Verifies tokens against the reCAPTCHA v3 siteverify endpoint and
/// thresholds the returned score.
pub struct ReCaptchaRiskAssessor {
    client: reqwest::Client,
    secret: String,
    min_score: f64,
}

impl ReCaptchaRiskAssessor {
    pub fn new(secret: String, min_score: f64) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret,
            min_score,
        }
    }
}

#[async_trait]
impl RiskAssessor for ReCaptchaRiskAssessor {
    async fn assess(&self, token: &str, hostname: &str, client_ip: Option<&str>) -> Result<bool> {
        let mut form = vec![
            ("secret", self.secret.as_str()),
            ("response", token),
        ];
        if let Some(ip) = client_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(RECAPTCHA_VERIFY_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Configuration(format!("Risk verification failed: {}", e)))?;
        let verdict: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Configuration(format!("Risk verification failed: {}", e)))?;

        let accepted = verdict.success && verdict.score >= self.min_score;
        if !accepted {
            tracing::warn!(
                hostname = %hostname,
                score = verdict.score,
                success = verdict.success,
                reported_hostname = ?verdict.hostname,
                "Visitor rejected by risk assessment"
            );
        }
        Ok(accepted)
    }
}

pub fn create_risk_assessor(config: &RiskConfig) -> Arc<dyn RiskAssessor> {
    match &config.recaptcha_secret {
        Some(secret) if !secret.is_empty() => {
            tracing::info!(min_score = config.min_score, "Using reCAPTCHA risk assessor");
            Arc::new(ReCaptchaRiskAssessor::new(secret.clone(), config.min_score))
        }
        _ => {
            tracing::info!("No risk secret configured, accepting all visitors");
            Arc::new(AllowAllRiskAssessor)
        }
    }
}
