// Bearer token model. The secret is zeroed when the last copy is dropped
// and never appears in Debug output.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::errors::ClientError;

/// Metadata key the credential travels under. gRPC keys are lowercase.
pub const AUTHORIZATION_KEY: &str = "authorization";

pub const BEARER_PREFIX: &str = "Bearer ";

/// Development token used when `CONNECT_AUTH_TOKEN` is unset.
pub const DEV_TOKEN: &str = "497532ba-406b-4e35-bb77-75eebbda962b";

#[derive(Clone)]
pub struct BearerToken {
    header: Arc<Zeroizing<String>>,
}

impl BearerToken {
    /// Validate `secret` and precompute the `Bearer <secret>` value.
    ///
    /// The secret must be non-empty printable ASCII without whitespace so the
    /// resulting value is always a legal gRPC ASCII metadata value.
    pub fn new(secret: impl Into<String>) -> Result<Self, ClientError> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(ClientError::InvalidToken("token is empty".into()));
        }
        if let Some(pos) = secret.chars().position(|c| !c.is_ascii_graphic()) {
            return Err(ClientError::InvalidToken(format!(
                "unsupported character at position {}",
                pos
            )));
        }

        let mut header = Zeroizing::new(String::with_capacity(BEARER_PREFIX.len() + secret.len()));
        header.push_str(BEARER_PREFIX);
        header.push_str(&secret);

        Ok(Self {
            header: Arc::new(header),
        })
    }

    pub fn secret(&self) -> &str {
        &self.header[BEARER_PREFIX.len()..]
    }

    /// Full metadata value, `Bearer <secret>`.
    pub fn header_value(&self) -> &str {
        &self.header
    }
}

impl PartialEq for BearerToken {
    fn eq(&self, other: &Self) -> bool {
        self.header.as_str() == other.header.as_str()
    }
}

impl Eq for BearerToken {}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}
