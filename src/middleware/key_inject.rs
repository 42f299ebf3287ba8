//! Credential injection for outgoing calls.
//!
//! Ensures every call carries an `authorization` entry. A call that already
//! has one (any value, any number of them) is left exactly as it was; a call
//! without one gets a single `Bearer <token>` entry appended after its
//! existing metadata.

use tonic::metadata::{Ascii, MetadataMap, MetadataValue};

use super::interceptor::CallInterceptor;
use super::redact::{describe_credentials, MetadataDisplay, TraceMode};
use crate::models::token::AUTHORIZATION_KEY;
use crate::models::{BearerToken, CallDetails, Metadata};

/// A metadata collection the injection rule can be applied to.
pub trait CredentialTarget {
    fn has_credential(&self) -> bool;
    fn append_credential(&mut self, token: &BearerToken);
}

impl CredentialTarget for Metadata {
    fn has_credential(&self) -> bool {
        self.contains_key(AUTHORIZATION_KEY)
    }

    fn append_credential(&mut self, token: &BearerToken) {
        self.append(AUTHORIZATION_KEY, token.header_value());
    }
}

impl CredentialTarget for MetadataMap {
    fn has_credential(&self) -> bool {
        self.contains_key(AUTHORIZATION_KEY)
    }

    fn append_credential(&mut self, token: &BearerToken) {
        // BearerToken only admits printable ASCII, so this always parses.
        match token.header_value().parse::<MetadataValue<Ascii>>() {
            Ok(value) => {
                self.append(AUTHORIZATION_KEY, value);
            }
            Err(_) => tracing::error!("bearer token is not valid metadata, not injecting"),
        }
    }
}

/// Append the bearer credential unless one is already present.
///
/// Returns `true` when an entry was added.
pub fn inject_credential<T>(metadata: &mut T, token: &BearerToken) -> bool
where
    T: CredentialTarget + ?Sized,
{
    if metadata.has_credential() {
        return false;
    }
    metadata.append_credential(token);
    true
}

/// Stateless interceptor attaching a bearer token to every call.
#[derive(Debug, Clone)]
pub struct CredentialInjector {
    token: BearerToken,
    trace: TraceMode,
}

impl CredentialInjector {
    pub fn new(token: BearerToken) -> Self {
        Self {
            token,
            trace: TraceMode::default(),
        }
    }

    pub fn with_trace_mode(mut self, trace: TraceMode) -> Self {
        self.trace = trace;
        self
    }

    pub fn token(&self) -> &BearerToken {
        &self.token
    }
}

impl CallInterceptor for CredentialInjector {
    fn prepare(&self, details: &mut CallDetails) {
        let injected = inject_credential(&mut details.metadata, &self.token);

        tracing::info!(
            method = details.method.as_deref().unwrap_or("<unknown>"),
            injected,
            metadata = %MetadataDisplay::new(&details.metadata, self.trace),
            credentials = %describe_credentials(details.credentials.as_ref(), self.trace),
            "outgoing call"
        );
    }
}

impl tonic::service::Interceptor for CredentialInjector {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status> {
        let injected = inject_credential(request.metadata_mut(), &self.token);

        let details = CallDetails::from_request(&request, None);
        tracing::info!(
            method = details.method.as_deref().unwrap_or("<unknown>"),
            injected,
            metadata = %MetadataDisplay::new(&details.metadata, self.trace),
            credentials = %describe_credentials(None, self.trace),
            "outgoing call"
        );

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::DEV_TOKEN;

    fn injector() -> CredentialInjector {
        CredentialInjector::new(BearerToken::new(DEV_TOKEN).unwrap())
    }

    const EXPECTED: &str = "Bearer 497532ba-406b-4e35-bb77-75eebbda962b";

    #[test]
    fn test_injects_into_empty_metadata() {
        let mut md = Metadata::new();
        assert!(inject_credential(&mut md, injector().token()));
        assert_eq!(md, Metadata::from(vec![("authorization", EXPECTED)]));
    }

    #[test]
    fn test_existing_credential_untouched() {
        let mut md = Metadata::from(vec![("authorization", "Bearer existing-token")]);
        assert!(!inject_credential(&mut md, injector().token()));
        assert_eq!(
            md,
            Metadata::from(vec![("authorization", "Bearer existing-token")])
        );
    }

    #[test]
    fn test_appends_after_existing_entries() {
        let mut md = Metadata::from(vec![("x-custom", "v")]);
        inject_credential(&mut md, injector().token());
        assert_eq!(
            md,
            Metadata::from(vec![("x-custom", "v"), ("authorization", EXPECTED)])
        );
    }

    #[test]
    fn test_duplicate_existing_entries_not_deduplicated() {
        let original = Metadata::from(vec![
            ("authorization", "Bearer a"),
            ("authorization", "Bearer b"),
        ]);
        let mut md = original.clone();
        inject_credential(&mut md, injector().token());
        assert_eq!(md, original);
    }

    #[test]
    fn test_key_match_is_exact() {
        let mut md = Metadata::from(vec![("Authorization", "Bearer other")]);
        assert!(inject_credential(&mut md, injector().token()));
        assert_eq!(md.get_all("authorization").collect::<Vec<_>>(), vec![EXPECTED]);
        assert_eq!(md.len(), 2);
    }

    #[test]
    fn test_injection_is_idempotent() {
        let mut md = Metadata::new();
        inject_credential(&mut md, injector().token());
        inject_credential(&mut md, injector().token());
        assert_eq!(md.len(), 1);
    }

    #[test]
    fn test_prepare_keeps_method_and_credentials() {
        let mut details = CallDetails::new("/svc/Method");
        injector().prepare(&mut details);
        assert_eq!(details.method.as_deref(), Some("/svc/Method"));
        assert!(details.credentials.is_none());
        assert_eq!(details.metadata.len(), 1);
    }

    #[test]
    fn test_tonic_interceptor_injects() {
        use tonic::service::Interceptor;

        let mut interceptor = injector();
        let req = interceptor.call(tonic::Request::new(())).unwrap();
        assert_eq!(req.metadata().get("authorization").unwrap(), EXPECTED);
    }

    #[test]
    fn test_tonic_interceptor_keeps_existing() {
        use tonic::service::Interceptor;

        let mut interceptor = injector();
        let mut req = tonic::Request::new(());
        req.metadata_mut()
            .insert("authorization", "Bearer existing-token".parse().unwrap());

        let req = interceptor.call(req).unwrap();
        let values: Vec<_> = req.metadata().get_all("authorization").iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer existing-token");
    }
}
