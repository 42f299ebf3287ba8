//! Connection strings and channel construction.
//!
//! Targets are written `sc://host[:port]/[;key=value]*`, e.g.
//! `sc://localhost:8100/;user_id=alice`. The builder turns one into a tonic
//! channel with the registered interceptors installed in front of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use url::Url;

use crate::errors::ClientError;
use crate::middleware::redact::REDACTED;
use crate::middleware::{CallInterceptor, InterceptorChain};
use crate::models::{BearerToken, CallCredentials};

pub const SCHEME: &str = "sc";
pub const DEFAULT_PORT: u16 = 15002;

pub const PARAM_TOKEN: &str = "token";
pub const PARAM_USE_SSL: &str = "use_ssl";
pub const PARAM_USER_ID: &str = "user_id";
pub const PARAM_USER_AGENT: &str = "user_agent";
pub const PARAM_SESSION_ID: &str = "session_id";

const DEFAULT_USER_AGENT: &str = concat!("connect-auth/", env!("CARGO_PKG_VERSION"));

/// Channel with the interceptor chain in front of it.
pub type InterceptedChannel = InterceptedService<Channel, InterceptorChain>;

/// A parsed `sc://` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    host: String,
    port: u16,
    params: BTreeMap<String, String>,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let url = Url::parse(raw)
            .map_err(|e| ClientError::connection_string(format!("'{}': {}", raw, e)))?;

        if url.scheme() != SCHEME {
            return Err(ClientError::connection_string(format!(
                "scheme must be '{}', got '{}'",
                SCHEME,
                url.scheme()
            )));
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(ClientError::connection_string("missing host")),
        };

        if url.query().is_some() || url.fragment().is_some() {
            return Err(ClientError::connection_string(
                "query and fragment are not supported, pass parameters as ';key=value'",
            ));
        }

        let path = url.path();
        let rest = path.strip_prefix('/').unwrap_or(path);
        let params = if rest.is_empty() {
            BTreeMap::new()
        } else if let Some(encoded) = rest.strip_prefix(';') {
            parse_params(encoded)?
        } else {
            return Err(ClientError::connection_string(format!(
                "path component must be empty, got '{}'",
                path
            )));
        };

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            params,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn token(&self) -> Result<Option<BearerToken>, ClientError> {
        self.param(PARAM_TOKEN).map(BearerToken::new).transpose()
    }

    /// TLS is on when asked for explicitly or when a token is carried.
    pub fn use_ssl(&self) -> bool {
        self.param(PARAM_USE_SSL)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
            || self.params.contains_key(PARAM_TOKEN)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.param(PARAM_USER_ID)
    }

    pub fn user_agent(&self) -> &str {
        self.param(PARAM_USER_AGENT).unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.param(PARAM_SESSION_ID)
    }

    /// `http(s)://host:port` for the underlying transport.
    pub fn endpoint_uri(&self) -> String {
        let scheme = if self.use_ssl() { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Serializable view with the token masked.
    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            host: self.host.clone(),
            port: self.port,
            endpoint: self.endpoint_uri(),
            use_ssl: self.use_ssl(),
            token: self.params.get(PARAM_TOKEN).map(|_| REDACTED),
            user_id: self.user_id().map(str::to_string),
            user_agent: self.user_agent().to_string(),
            session_id: self.session_id().map(str::to_string),
            params: self
                .params
                .iter()
                .filter(|(k, _)| k.as_str() != PARAM_TOKEN)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

fn parse_params(encoded: &str) -> Result<BTreeMap<String, String>, ClientError> {
    let mut params = BTreeMap::new();
    for part in encoded.split(';').filter(|p| !p.is_empty()) {
        let (key, value) = match part.split_once('=') {
            Some((k, v)) if !k.is_empty() && !v.contains('=') => (k, v),
            _ => {
                return Err(ClientError::connection_string(format!(
                    "parameter '{}' must be a key=value pair",
                    part
                )))
            }
        };
        let value = urlencoding::decode(value)
            .map_err(|e| ClientError::connection_string(format!("parameter '{}': {}", key, e)))?;
        params.insert(key.to_string(), value.into_owned());
    }
    Ok(params)
}

#[derive(Debug, Serialize)]
pub struct ConnectionSummary {
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    pub use_ssl: bool,
    pub token: Option<&'static str>,
    pub user_id: Option<String>,
    pub user_agent: String,
    pub session_id: Option<String>,
    pub params: BTreeMap<String, String>,
}

/// Builds an intercepted tonic channel for a connection string.
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    connection: ConnectionString,
    chain: InterceptorChain,
}

impl ChannelBuilder {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let connection = ConnectionString::parse(url)?;
        let mut chain = InterceptorChain::new();
        chain.set_credentials(connection.token()?.map(CallCredentials::AccessToken));
        Ok(Self { connection, chain })
    }

    /// Register an interceptor. Interceptors run in the order they are added.
    pub fn add_interceptor<I>(&mut self, interceptor: I) -> &mut Self
    where
        I: CallInterceptor + 'static,
    {
        self.chain.push(Arc::new(interceptor));
        self
    }

    pub fn connection(&self) -> &ConnectionString {
        &self.connection
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.chain
    }

    pub fn endpoint(&self) -> Result<Endpoint, ClientError> {
        let uri = self.connection.endpoint_uri();
        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| ClientError::connection_string(format!("'{}': {}", uri, e)))?
            .user_agent(self.connection.user_agent().to_string())?;

        if self.connection.use_ssl() {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }
        Ok(endpoint)
    }

    pub async fn connect(&self) -> Result<InterceptedChannel, ClientError> {
        let endpoint = self.endpoint()?;
        tracing::debug!(
            endpoint = %self.connection.endpoint_uri(),
            interceptors = self.chain.len(),
            "connecting"
        );
        let channel = endpoint.connect().await?;
        Ok(InterceptedService::new(channel, self.chain.clone()))
    }

    /// Same as `connect` but the TCP connection is made on first use.
    pub fn connect_lazy(&self) -> Result<InterceptedChannel, ClientError> {
        let channel = self.endpoint()?.connect_lazy();
        Ok(InterceptedService::new(channel, self.chain.clone()))
    }
}
