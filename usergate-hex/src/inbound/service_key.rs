//! Service-key gate for the `/api/v1` group.
//!
//! Callers send `x-api-key: <hex>` where the hex decodes to an AES-CBC
//! (PKCS#7) ciphertext of `{"date_time": "<RFC 3339>"}`. Keys older than a
//! minute, or more than a minute in the future, are refused.

use std::sync::Arc;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use usergate_types::AppError;

use super::respond::ApiError;

pub const SERVICE_KEY_HEADER: &str = "x-api-key";
pub const MAX_KEY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceKeyError {
    #[error("key must be 16, 24 or 32 bytes and iv 16 bytes")]
    BadKeyMaterial,

    #[error("not hex")]
    Hex,

    #[error("decryption failed")]
    Decrypt,

    #[error("malformed payload")]
    Payload,

    #[error("timestamp outside the accepted window")]
    Stale,
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyPayload {
    date_time: String,
}

/// Verifies (and, for clients and tests, issues) service keys.
#[derive(Clone)]
pub struct ServiceKeyGate {
    key: Vec<u8>,
    iv: [u8; 16],
    dev_bypass: Option<String>,
    public_paths: Vec<String>,
}

impl std::fmt::Debug for ServiceKeyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceKeyGate")
            .field("key_bits", &(self.key.len() * 8))
            .field("dev_bypass", &self.dev_bypass.is_some())
            .field("public_paths", &self.public_paths)
            .finish_non_exhaustive()
    }
}

impl ServiceKeyGate {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, ServiceKeyError> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(ServiceKeyError::BadKeyMaterial);
        }
        let iv: [u8; 16] = iv.try_into().map_err(|_| ServiceKeyError::BadKeyMaterial)?;

        Ok(Self {
            key: key.to_vec(),
            iv,
            dev_bypass: None,
            public_paths: vec!["swagger".into(), "webhook".into(), "scalar".into()],
        })
    }

    /// Builds a gate from hex-encoded key and IV.
    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self, ServiceKeyError> {
        let key = hex::decode(key_hex.trim()).map_err(|_| ServiceKeyError::Hex)?;
        let iv = hex::decode(iv_hex.trim()).map_err(|_| ServiceKeyError::Hex)?;
        Self::new(&key, &iv)
    }

    /// A literal header value admitted without decryption. Empty disables it.
    pub fn with_dev_bypass(mut self, bypass: Option<String>) -> Self {
        self.dev_bypass = bypass.filter(|b| !b.is_empty());
        self
    }

    /// Path substrings that skip the gate entirely.
    pub fn with_public_paths(mut self, paths: Vec<String>) -> Self {
        self.public_paths = paths.into_iter().filter(|p| !p.is_empty()).collect();
        self
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.contains(p.as_str()))
    }

    pub fn verify(&self, header: &str) -> Result<(), ServiceKeyError> {
        self.verify_at(header, Utc::now())
    }

    pub fn verify_at(&self, header: &str, now: DateTime<Utc>) -> Result<(), ServiceKeyError> {
        if let Some(bypass) = &self.dev_bypass {
            if bool::from(bypass.as_bytes().ct_eq(header.as_bytes())) {
                tracing::debug!("service key dev bypass used");
                return Ok(());
            }
        }

        let ciphertext = hex::decode(header.trim()).map_err(|_| ServiceKeyError::Hex)?;
        let plaintext = self.decrypt(&ciphertext)?;
        let payload: KeyPayload =
            serde_json::from_slice(&plaintext).map_err(|_| ServiceKeyError::Payload)?;
        let stamped = DateTime::parse_from_rfc3339(&payload.date_time)
            .map_err(|_| ServiceKeyError::Payload)?
            .with_timezone(&Utc);

        let age = now.signed_duration_since(stamped).abs();
        if age > chrono::Duration::seconds(MAX_KEY_SKEW_SECS) {
            return Err(ServiceKeyError::Stale);
        }
        Ok(())
    }

    pub fn issue(&self) -> Result<String, ServiceKeyError> {
        self.issue_at(Utc::now())
    }

    /// Produces a header value that verifies at `now`.
    pub fn issue_at(&self, now: DateTime<Utc>) -> Result<String, ServiceKeyError> {
        let payload = serde_json::to_vec(&KeyPayload {
            date_time: now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        })
        .map_err(|_| ServiceKeyError::Payload)?;
        Ok(hex::encode(self.encrypt(&payload)?))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ServiceKeyError> {
        fn run<C: BlockDecryptMut + KeyIvInit>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, ServiceKeyError> {
            C::new_from_slices(key, iv)
                .map_err(|_| ServiceKeyError::BadKeyMaterial)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(|_| ServiceKeyError::Decrypt)
        }

        match self.key.len() {
            16 => run::<cbc::Decryptor<aes::Aes128>>(&self.key, &self.iv, ciphertext),
            24 => run::<cbc::Decryptor<aes::Aes192>>(&self.key, &self.iv, ciphertext),
            32 => run::<cbc::Decryptor<aes::Aes256>>(&self.key, &self.iv, ciphertext),
            _ => Err(ServiceKeyError::BadKeyMaterial),
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ServiceKeyError> {
        fn run<C: BlockEncryptMut + KeyIvInit>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, ServiceKeyError> {
            Ok(C::new_from_slices(key, iv)
                .map_err(|_| ServiceKeyError::BadKeyMaterial)?
                .encrypt_padded_vec_mut::<Pkcs7>(data))
        }

        match self.key.len() {
            16 => run::<cbc::Encryptor<aes::Aes128>>(&self.key, &self.iv, plaintext),
            24 => run::<cbc::Encryptor<aes::Aes192>>(&self.key, &self.iv, plaintext),
            32 => run::<cbc::Encryptor<aes::Aes256>>(&self.key, &self.iv, plaintext),
            _ => Err(ServiceKeyError::BadKeyMaterial),
        }
    }
}

/// Service-key middleware.
pub async fn service_key_middleware(
    State(gate): State<Arc<ServiceKeyGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if gate.is_public(request.uri().path()) {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if header.is_empty() {
        return ApiError(AppError::TokenMissing).into_response();
    }

    if let Err(reason) = gate.verify(header) {
        tracing::debug!(%reason, "service key rejected");
        return ApiError(AppError::Unauthorized("Unauthorized Access".into())).into_response();
    }

    next.run(request).await
}
