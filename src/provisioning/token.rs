//! Token Minter (§4.7): builds and signs a short-lived bearer token scoped to a
//! destination. A fresh token is minted on every attempt; nothing is cached.

use crate::config::SigningConfig;
use crate::domain::{Destination, ScimScope, StringUuid};
use crate::error::Result;
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub client_id: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

/// The abstraction boundary onto the authorization server's signing-key store.
/// The core only needs "sign these claims"; key rotation and JWKS publication
/// belong to the issuer.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait TokenSigner: Send + Sync {
    async fn sign(&self, claims: &DestinationTokenClaims) -> Result<String>;
}

/// HMAC-signed stand-in for the real issuer. Populates `kid` so a verifier can
/// select among rotated keys even though this implementation only has one.
pub struct JwtTokenSigner {
    encoding_key: EncodingKey,
    kid: String,
}

impl JwtTokenSigner {
    pub fn new(config: &SigningConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.hmac_secret.as_bytes()),
            kid: config.kid.clone(),
        }
    }
}

#[async_trait]
impl TokenSigner for JwtTokenSigner {
    async fn sign(&self, claims: &DestinationTokenClaims) -> Result<String> {
        let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some(self.kid.clone());
        let token = encode(&header, claims, &self.encoding_key)?;
        Ok(token)
    }
}

pub struct TokenMinter<S: TokenSigner> {
    signer: S,
    issuer_base_url: String,
    token_lifetime: Duration,
}

impl<S: TokenSigner> TokenMinter<S> {
    pub fn new(signer: S, issuer_base_url: impl Into<String>, token_lifetime: Duration) -> Self {
        Self {
            signer,
            issuer_base_url: issuer_base_url.into(),
            token_lifetime,
        }
    }

    fn tenant_issuer(&self, tenant_id: StringUuid) -> String {
        format!("{}/t/{}", self.issuer_base_url.trim_end_matches('/'), tenant_id)
    }

    pub async fn mint(
        &self,
        destination: &Destination,
        required_scopes: &std::collections::BTreeSet<ScimScope>,
    ) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = DestinationTokenClaims {
            iss: self.tenant_issuer(destination.tenant_id),
            sub: destination.client_app_id.to_string(),
            aud: destination.base_url_trimmed().to_string(),
            client_id: destination.client_app_id.to_string(),
            scope: required_scopes
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            iat: now,
            exp: now + self.token_lifetime.as_secs() as i64,
        };
        self.signer.sign(&claims).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeleteAction, OperationKind, RetryPolicy};
    use std::collections::{BTreeMap, BTreeSet};

    fn sample_destination() -> Destination {
        Destination {
            id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            client_app_id: StringUuid::new_v4(),
            name: "Workday".into(),
            base_url: "https://scim.example.com/v2/".into(),
            attribute_mapping: BTreeMap::new(),
            enabled_operations: BTreeSet::from([OperationKind::CreateUser]),
            delete_action: DeleteAction::Deactivate,
            retry_policy: RetryPolicy::default(),
            enabled: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn mint_produces_a_verifiable_token_with_expected_claims() {
        let config = SigningConfig {
            hmac_secret: "test-secret".into(),
            kid: "key-1".into(),
            issuer_base_url: "https://auth.example.com".into(),
        };
        let minter = TokenMinter::new(
            JwtTokenSigner::new(&config),
            config.issuer_base_url.clone(),
            Duration::from_secs(3600),
        );
        let destination = sample_destination();
        let scopes = BTreeSet::from([ScimScope::UsersWrite]);

        let token = minter.mint(&destination, &scopes).await.unwrap();

        let decoding_key = jsonwebtoken::DecodingKey::from_secret(b"test-secret");
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_audience(&["https://scim.example.com/v2"]);
        let decoded = jsonwebtoken::decode::<DestinationTokenClaims>(&token, &decoding_key, &validation)
            .unwrap();

        assert_eq!(decoded.claims.sub, destination.client_app_id.to_string());
        assert_eq!(decoded.claims.scope, "scim:users:write");
        assert_eq!(decoded.header.kid.as_deref(), Some("key-1"));
        assert!(decoded.claims.exp > decoded.claims.iat);
    }

    #[tokio::test]
    async fn every_mint_call_is_independent_no_caching() {
        let config = SigningConfig {
            hmac_secret: "test-secret".into(),
            kid: "key-1".into(),
            issuer_base_url: "https://auth.example.com".into(),
        };
        let minter = TokenMinter::new(
            JwtTokenSigner::new(&config),
            config.issuer_base_url.clone(),
            Duration::from_secs(60),
        );
        let destination = sample_destination();
        let scopes = BTreeSet::from([ScimScope::UsersWrite]);

        let first = minter.mint(&destination, &scopes).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let second = minter.mint(&destination, &scopes).await.unwrap();

        assert_ne!(first, second, "iat should differ between attempts a second apart");
    }
}
