//! HS256 bearer tokens: issuing and the authentication gate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use longcut_core::error::{LongcutError, Result};

use super::gate::{GateContext, GateOutcome, PolicyGate};
use crate::config::MicroSection;

/// Claims carried by tokens this gateway issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub wallet: String,
    #[serde(rename = "securityLevel", default)]
    pub security_level: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    wallet: String,
}

impl JwtAuthenticator {
    pub fn new(secret: &[u8], ttl: Duration, wallet: impl Into<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            wallet: wallet.into(),
        }
    }

    /// Uses `micro.jwt_secret`, or a per-process random secret when unset.
    pub fn from_config(micro: &MicroSection, wallet: &str) -> Self {
        let ttl = Duration::from_secs(micro.token_ttl_secs);
        match &micro.jwt_secret {
            Some(secret) => Self::new(secret.as_bytes(), ttl, wallet),
            None => {
                tracing::warn!("micro.jwt_secret not set; issued tokens will not survive a restart");
                let mut secret = [0u8; 64];
                rand::thread_rng().fill_bytes(&mut secret);
                Self::new(&secret, ttl, wallet)
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    pub fn issue(&self, subject: &str, permissions: Vec<String>) -> Result<String> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = AccessClaims {
            sub: subject.to_string(),
            permissions,
            wallet: self.wallet.clone(),
            security_level: "MICRO".to_string(),
            iat,
            exp: iat.saturating_add(ttl),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| LongcutError::Internal(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> std::result::Result<AccessClaims, jsonwebtoken::errors::Error> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

#[async_trait]
impl PolicyGate for JwtAuthenticator {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn validate(&self, ctx: &GateContext) -> GateOutcome {
        let token = match ctx.credential.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => return GateOutcome::deny("token missing"),
        };

        match self.verify(token) {
            Ok(claims) => GateOutcome::accept("token verified").with_reference(claims.sub),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => GateOutcome::deny("token expired"),
                _ => GateOutcome::deny("token rejected"),
            },
        }
    }
}
