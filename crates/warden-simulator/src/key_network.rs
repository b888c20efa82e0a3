//! Simulated key network: minting, session signatures and digest signing.

use crate::faults::MintFault;
use crate::keys;
use crate::network::{BoundKey, SimState, SimulatedNetwork};
use crate::record::CallRecord;
use alloy_primitives::{keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use warden_core::effects::key_network::MintReceipt;
use warden_core::effects::KeyNetworkEffects;
use warden_core::{
    IdentityAssertion, SessionRequest, SessionSignature, SignerIdentity, WardenError,
    WardenResult,
};

fn subject_for(state: &SimState, assertion: &IdentityAssertion) -> WardenResult<String> {
    match state.access_tokens.get(&assertion.access_token) {
        Some(subject) if *subject == assertion.subject => Ok(subject.clone()),
        _ => Err(WardenError::external(
            "key network rejected the identity assertion",
        )),
    }
}

fn token_id(subject: &str, counter: u64) -> String {
    let hash = keccak256(format!("{subject}/{counter}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

#[async_trait]
impl KeyNetworkEffects for SimulatedNetwork {
    async fn fetch_signer_identities(
        &self,
        assertion: &IdentityAssertion,
    ) -> WardenResult<Vec<SignerIdentity>> {
        let mut state = self.state.lock();
        state.record(CallRecord::FetchSignerIdentities);
        let subject = subject_for(&state, assertion)?;
        Ok(state
            .bound_keys
            .get(&subject)
            .map(|keys| {
                keys.iter()
                    .map(|k| SignerIdentity::new(k.public_key.clone(), k.token_id.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn mint_signer_identity(
        &self,
        assertion: &IdentityAssertion,
        relay_api_key: &str,
    ) -> WardenResult<MintReceipt> {
        let mut state = self.state.lock();
        state.record(CallRecord::MintSignerIdentity);
        if relay_api_key.trim().is_empty() {
            return Err(WardenError::external("relay rejected an empty API key"));
        }
        let subject = subject_for(&state, assertion)?;
        state.mint_counter += 1;
        let counter = state.mint_counter;
        let token_id = token_id(&subject, counter);

        let fault = state.faults.mint;
        let public_key = match fault {
            Some(MintFault::NoKey) => {
                tracing::debug!(%subject, "mint fault: no key bound");
                return Ok(MintReceipt {
                    token_id: Some(token_id),
                });
            }
            Some(MintFault::MalformedKey) => {
                let mut compressed = vec![0x02];
                compressed.extend_from_slice(keccak256(subject.as_bytes()).as_slice());
                Bytes::from(compressed)
            }
            None => {
                let secret = keys::derive_secret(&format!("key-network/{subject}"), counter);
                state.secrets.insert(keys::address(secret), secret);
                keys::public_key(secret)
            }
        };

        state.bound_keys.entry(subject).or_default().push(BoundKey {
            public_key,
            token_id: token_id.clone(),
        });
        Ok(MintReceipt {
            token_id: Some(token_id),
        })
    }

    async fn issue_session_signature(
        &self,
        assertion: &IdentityAssertion,
        public_key: &Bytes,
        request: &SessionRequest,
    ) -> WardenResult<SessionSignature> {
        let mut state = self.state.lock();
        state.record(CallRecord::IssueSessionSignature {
            expires_at_ms: request.expires_at_ms,
            chain_id: request.chain_id,
        });
        let subject = subject_for(&state, assertion)?;
        let owns_key = state
            .bound_keys
            .get(&subject)
            .is_some_and(|keys| keys.iter().any(|k| k.public_key == *public_key));
        if !owns_key {
            return Err(WardenError::external(
                "key is not bound to the assertion's identity",
            ));
        }
        if request.expires_at_ms <= state.now_ms {
            return Err(WardenError::external("session request already expired"));
        }

        let mut material = Vec::new();
        material.extend_from_slice(assertion.access_token.as_bytes());
        material.extend_from_slice(public_key);
        material.extend_from_slice(&request.expires_at_ms.to_be_bytes());
        material.extend_from_slice(&state.now_ms.to_be_bytes());
        let delegation = Bytes::copy_from_slice(keccak256(&material).as_slice());
        state.prune_sessions();
        state.sessions.insert(delegation.clone(), request.expires_at_ms);

        Ok(SessionSignature {
            delegation,
            public_key: public_key.clone(),
            expires_at_ms: request.expires_at_ms,
        })
    }

    async fn sign_digest(
        &self,
        session: &SessionSignature,
        public_key: &Bytes,
        digest: B256,
    ) -> WardenResult<Bytes> {
        let mut state = self.state.lock();
        state.record(CallRecord::SignDigest { digest });
        if !state.sessions.contains_key(&session.delegation) || session.public_key != *public_key {
            return Err(WardenError::external("unknown session signature"));
        }
        if !session.is_valid_at(state.now_ms) {
            return Err(WardenError::external("session signature expired"));
        }
        if public_key.len() < 2 {
            return Err(WardenError::external("malformed public key"));
        }
        let address = Address::from_slice(&keccak256(&public_key[1..])[12..]);
        let secret = state
            .secrets
            .get(&address)
            .copied()
            .ok_or_else(|| WardenError::external("key network does not hold this key"))?;
        Ok(keys::sign(secret, digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::effects::IdentityEffects;
    use warden_core::{ReturnContext, SessionAbility};

    async fn assertion(sim: &SimulatedNetwork) -> IdentityAssertion {
        let context: ReturnContext = sim.sign_in_callback("http://localhost/").await.unwrap();
        sim.authenticate(&context).await.unwrap().unwrap()
    }

    fn request(expires_at_ms: u64) -> SessionRequest {
        SessionRequest {
            statement: "test".into(),
            resource: "*".into(),
            ability: SessionAbility::KeySigning,
            expires_at_ms,
            chain_id: 1,
        }
    }

    #[tokio::test]
    async fn minted_key_signs_only_under_live_session() {
        let sim = SimulatedNetwork::new();
        let assertion = assertion(&sim).await;
        assert!(sim.fetch_signer_identities(&assertion).await.unwrap().is_empty());

        sim.mint_signer_identity(&assertion, "relay").await.unwrap();
        let identity = sim.fetch_signer_identities(&assertion).await.unwrap()[0].clone();
        assert!(identity.is_usable());

        let expires = sim.clock_ms() + 60_000;
        let session = sim
            .issue_session_signature(&assertion, &identity.public_key, &request(expires))
            .await
            .unwrap();
        let digest = B256::repeat_byte(3);
        let sig = sim
            .sign_digest(&session, &identity.public_key, digest)
            .await
            .unwrap();
        assert_eq!(sig.len(), 65);

        sim.advance(std::time::Duration::from_secs(61));
        assert!(sim
            .sign_digest(&session, &identity.public_key, digest)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn expired_sessions_are_forgotten() {
        let sim = SimulatedNetwork::new();
        let assertion = assertion(&sim).await;
        sim.mint_signer_identity(&assertion, "relay").await.unwrap();
        let identity = sim.fetch_signer_identities(&assertion).await.unwrap()[0].clone();

        for _ in 0..3 {
            let expires = sim.clock_ms() + 1_000;
            sim.issue_session_signature(&assertion, &identity.public_key, &request(expires))
                .await
                .unwrap();
            sim.advance(std::time::Duration::from_secs(2));
        }
        assert_eq!(sim.live_sessions(), 0);

        let expires = sim.clock_ms() + 1_000;
        sim.issue_session_signature(&assertion, &identity.public_key, &request(expires))
            .await
            .unwrap();
        assert_eq!(sim.live_sessions(), 1);
    }

    #[tokio::test]
    async fn malformed_mint_fault_binds_compressed_key() {
        let sim = SimulatedNetwork::new();
        sim.configure_faults(|f| f.mint = Some(MintFault::MalformedKey));
        let assertion = assertion(&sim).await;
        sim.mint_signer_identity(&assertion, "relay").await.unwrap();
        let identities = sim.fetch_signer_identities(&assertion).await.unwrap();
        assert_eq!(identities.len(), 1);
        assert!(!identities[0].is_usable());
    }
}
