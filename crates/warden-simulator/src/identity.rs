//! Simulated OAuth-style identity provider.

use crate::network::SimulatedNetwork;
use crate::record::CallRecord;
use alloy_primitives::keccak256;
use async_trait::async_trait;
use std::collections::BTreeMap;
use warden_core::effects::IdentityEffects;
use warden_core::identity::PROVIDER_PARAM;
use warden_core::{IdentityAssertion, ReturnContext, WardenError, WardenResult};

/// Provider name the simulator reports.
pub const SIM_PROVIDER: &str = "google";

const CONSENT_BASE: &str = "https://accounts.sim.warden/o/oauth2/consent";
const ACCESS_TOKEN_PARAM: &str = "access_token";

impl SimulatedNetwork {
    /// Approve a consent screen as the user would, returning the callback URL
    /// the provider redirects to.
    pub fn approve_consent(&self, consent_url: &str) -> WardenResult<String> {
        let context = ReturnContext::from_url(consent_url)?;
        let state_param = context
            .get("state")
            .ok_or_else(|| WardenError::invalid("consent URL has no state"))?;

        let mut state = self.state.lock();
        let redirect_uri = state
            .consents
            .remove(state_param)
            .ok_or_else(|| WardenError::invalid("unknown or already used consent"))?;
        let access_token = format!("sim-token-{}", token_uuid(state_param));
        let subject = state.subject.clone();
        state.access_tokens.insert(access_token.clone(), subject);

        let query = serde_urlencoded::to_string([
            (PROVIDER_PARAM, SIM_PROVIDER),
            (ACCESS_TOKEN_PARAM, access_token.as_str()),
        ])
        .map_err(|e| WardenError::internal(e.to_string()))?;
        let separator = if redirect_uri.contains('?') { '&' } else { '?' };
        Ok(format!("{redirect_uri}{separator}{query}"))
    }

    /// Convenience: start and approve a consent in one step.
    pub async fn sign_in_callback(&self, redirect_uri: &str) -> WardenResult<ReturnContext> {
        let url = self.sign_in_url(redirect_uri).await?;
        ReturnContext::from_url(&self.approve_consent(&url)?)
    }
}

fn token_uuid(seed: &str) -> uuid::Uuid {
    let hash = keccak256(seed.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

#[async_trait]
impl IdentityEffects for SimulatedNetwork {
    async fn sign_in_url(&self, redirect_uri: &str) -> WardenResult<String> {
        let mut state = self.state.lock();
        state.record(CallRecord::SignInUrl);
        state.consent_counter += 1;
        let state_param = format!("consent-{}", state.consent_counter);
        state
            .consents
            .insert(state_param.clone(), redirect_uri.to_string());

        let mut params = BTreeMap::new();
        params.insert("redirect_uri", redirect_uri);
        params.insert("response_type", "token");
        params.insert("state", state_param.as_str());
        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| WardenError::internal(e.to_string()))?;
        Ok(format!("{CONSENT_BASE}?{query}"))
    }

    async fn authenticate(
        &self,
        context: &ReturnContext,
    ) -> WardenResult<Option<IdentityAssertion>> {
        let mut state = self.state.lock();
        state.record(CallRecord::Authenticate);
        if state.faults.withhold_assertion || !context.has_returned_from_provider() {
            return Ok(None);
        }
        let Some(access_token) = context.get(ACCESS_TOKEN_PARAM) else {
            return Ok(None);
        };
        let Some(subject) = state.access_tokens.get(access_token) else {
            tracing::debug!("callback carries an unknown access token");
            return Ok(None);
        };
        Ok(Some(IdentityAssertion {
            provider: context.provider().unwrap_or(SIM_PROVIDER).to_string(),
            subject: subject.clone(),
            access_token: access_token.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consent_round_trip_yields_assertion() {
        let sim = SimulatedNetwork::new().with_subject("alice");
        let url = sim.sign_in_url("http://localhost:5173/").await.unwrap();
        assert!(url.starts_with(CONSENT_BASE));

        let callback = sim.approve_consent(&url).unwrap();
        assert!(callback.starts_with("http://localhost:5173/?provider=google"));

        let context = ReturnContext::from_url(&callback).unwrap();
        let assertion = sim.authenticate(&context).await.unwrap().unwrap();
        assert_eq!(assertion.subject, "alice");
        assert_eq!(assertion.provider, "google");

        // consents are single use
        assert!(sim.approve_consent(&url).is_err());
    }

    #[tokio::test]
    async fn forged_token_is_not_an_assertion() {
        let sim = SimulatedNetwork::new();
        let context =
            ReturnContext::from_params([("provider", "google"), ("access_token", "forged")]);
        assert!(sim.authenticate(&context).await.unwrap().is_none());
    }
}
