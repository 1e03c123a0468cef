//! HS256 bearer tokens: issuing access/refresh pairs and verifying them.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use usergate_types::{Claims, Identity, TokenKind, TokenPair};

pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtError {
    #[error("failed to sign token: {0}")]
    Sign(String),

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn generate(&self, seed: &Identity) -> Result<TokenPair, JwtError> {
        self.generate_at(seed, unix_now())
    }

    /// Issues an access token carrying the full identity and a refresh token
    /// carrying only id and uuid, both stamped with `now` (unix seconds).
    pub fn generate_at(&self, seed: &Identity, now: i64) -> Result<TokenPair, JwtError> {
        let access = Claims {
            user_id: seed.user_id,
            email: seed.email.clone(),
            role: seed.role.clone(),
            uuid: seed.uuid.clone(),
            kind: TokenKind::Access,
            iat: now,
            exp: now + self.access_ttl.as_secs() as i64,
        };
        let refresh = Claims {
            user_id: seed.user_id,
            email: String::new(),
            role: String::new(),
            uuid: seed.uuid.clone(),
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + self.refresh_ttl.as_secs() as i64,
        };

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
        })
    }

    pub fn parse(&self, token: &str) -> Result<Claims, JwtError> {
        self.parse_at(token, unix_now())
    }

    /// Verifies signature and algorithm, then rejects the token once
    /// `now` reaches `exp`. No leeway.
    pub fn parse_at(&self, token: &str, now: i64) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        if now >= claims.exp {
            return Err(JwtError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Sign(e.to_string()))
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_secret_key_for_testing_purposes_only";

    fn service() -> JwtService {
        JwtService::new(SECRET, Duration::from_secs(900), DEFAULT_REFRESH_TTL)
    }

    fn seed() -> Identity {
        Identity {
            user_id: 42,
            email: "john@example.com".into(),
            role: "user".into(),
            uuid: "5b1f0c9e-0000-4000-8000-000000000001".into(),
        }
    }

    #[test]
    fn test_generate_and_parse_roundtrip() {
        let jwt = service();
        let now = unix_now();

        let pair = jwt.generate_at(&seed(), now).unwrap();
        let access = jwt.parse(&pair.access_token).unwrap();
        let refresh = jwt.parse(&pair.refresh_token).unwrap();

        assert_eq!(access.user_id, 42);
        assert_eq!(access.email, "john@example.com");
        assert_eq!(access.role, "user");
        assert_eq!(access.kind, TokenKind::Access);
        assert_eq!(access.iat, now);
        assert_eq!(access.exp, now + 900);

        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.uuid, access.uuid);
        assert!(refresh.email.is_empty());
        assert!(refresh.role.is_empty());
        assert_eq!(refresh.exp, now + 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_expired_token() {
        let jwt = service();
        let issued = unix_now() - 20 * 60;

        let pair = jwt.generate_at(&seed(), issued).unwrap();

        assert_eq!(jwt.parse(&pair.access_token), Err(JwtError::Expired));
        // Exactly at `exp` is already expired.
        assert_eq!(
            jwt.parse_at(&pair.access_token, issued + 900),
            Err(JwtError::Expired)
        );
        assert!(jwt.parse_at(&pair.access_token, issued + 899).is_ok());

        let refresh = jwt.parse_at(&pair.refresh_token, issued + 900).unwrap();
        assert_eq!(refresh.kind, TokenKind::Refresh);
    }

    #[test]
    fn test_bad_signature() {
        let pair = JwtService::new(b"secret-A", Duration::from_secs(60), DEFAULT_REFRESH_TTL)
            .generate(&seed())
            .unwrap();
        let other = JwtService::new(b"secret-B", Duration::from_secs(60), DEFAULT_REFRESH_TTL);

        assert!(matches!(
            other.parse(&pair.access_token),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let claims = Claims {
            user_id: 1,
            email: String::new(),
            role: String::new(),
            uuid: String::new(),
            kind: TokenKind::Access,
            iat: unix_now(),
            exp: unix_now() + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(matches!(service().parse(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            service().parse("not.a.token"),
            Err(JwtError::Invalid(_))
        ));
    }
}
