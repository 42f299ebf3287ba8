//! Client-side call interception.
//!
//! A transport exposes four hook points, one per call shape. Every hook in
//! this crate funnels into the same per-call policy, `CallInterceptor::prepare`,
//! and then hands the (possibly changed) call details and the untouched
//! request to the continuation. Whatever the continuation returns, success
//! or failure, is returned as-is.

use std::sync::Arc;

use futures::Stream;

use crate::models::{CallCredentials, CallDetails};

/// Object-safe per-call policy shared by all four call shapes.
pub trait CallInterceptor: Send + Sync {
    /// Inspect and mutate the outgoing call before it is forwarded.
    fn prepare(&self, details: &mut CallDetails);
}

impl<T: CallInterceptor + ?Sized> CallInterceptor for Arc<T> {
    fn prepare(&self, details: &mut CallDetails) {
        (**self).prepare(details)
    }
}

/// The four interception hooks.
///
/// `continuation` is the next stage of the call pipeline. For streaming
/// requests the payload is a lazy `Stream` that is forwarded without being
/// polled.
pub trait ClientInterceptor {
    fn intercept_unary_unary<Req, R, F>(&self, continuation: F, details: CallDetails, request: Req) -> R
    where
        F: FnOnce(CallDetails, Req) -> R;

    fn intercept_unary_stream<Req, R, F>(&self, continuation: F, details: CallDetails, request: Req) -> R
    where
        F: FnOnce(CallDetails, Req) -> R;

    fn intercept_stream_unary<S, R, F>(&self, continuation: F, details: CallDetails, requests: S) -> R
    where
        S: Stream,
        F: FnOnce(CallDetails, S) -> R;

    fn intercept_stream_stream<S, R, F>(&self, continuation: F, details: CallDetails, requests: S) -> R
    where
        S: Stream,
        F: FnOnce(CallDetails, S) -> R;
}

impl<T: CallInterceptor + ?Sized> ClientInterceptor for T {
    fn intercept_unary_unary<Req, R, F>(&self, continuation: F, details: CallDetails, request: Req) -> R
    where
        F: FnOnce(CallDetails, Req) -> R,
    {
        forward(self, continuation, details, request)
    }

    fn intercept_unary_stream<Req, R, F>(&self, continuation: F, details: CallDetails, request: Req) -> R
    where
        F: FnOnce(CallDetails, Req) -> R,
    {
        forward(self, continuation, details, request)
    }

    fn intercept_stream_unary<S, R, F>(&self, continuation: F, details: CallDetails, requests: S) -> R
    where
        S: Stream,
        F: FnOnce(CallDetails, S) -> R,
    {
        forward(self, continuation, details, requests)
    }

    fn intercept_stream_stream<S, R, F>(&self, continuation: F, details: CallDetails, requests: S) -> R
    where
        S: Stream,
        F: FnOnce(CallDetails, S) -> R,
    {
        forward(self, continuation, details, requests)
    }
}

fn forward<I, P, R, F>(interceptor: &I, continuation: F, mut details: CallDetails, payload: P) -> R
where
    I: CallInterceptor + ?Sized,
    F: FnOnce(CallDetails, P) -> R,
{
    interceptor.prepare(&mut details);
    continuation(details, payload)
}

/// Interceptors registered on a channel, run in registration order.
///
/// Also implements tonic's `Interceptor`, so the chain applies to every
/// request sent through an intercepted channel whatever its call shape.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn CallInterceptor>>,
    credentials: Option<CallCredentials>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn CallInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Transport credential handed to every call made through this chain.
    pub fn set_credentials(&mut self, credentials: Option<CallCredentials>) {
        self.credentials = credentials;
    }

    pub fn credentials(&self) -> Option<&CallCredentials> {
        self.credentials.as_ref()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl CallInterceptor for InterceptorChain {
    fn prepare(&self, details: &mut CallDetails) {
        if details.credentials.is_none() {
            details.credentials = self.credentials.clone();
        }
        for interceptor in &self.interceptors {
            interceptor.prepare(details);
        }
    }
}

impl tonic::service::Interceptor for InterceptorChain {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status> {
        if self.interceptors.is_empty() {
            return Ok(request);
        }
        let mut details = CallDetails::from_request(&request, self.credentials.clone());
        self.prepare(&mut details);
        details.metadata.write_into(request.metadata_mut());
        Ok(request)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.interceptors.len())
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tag(&'static str);

    impl CallInterceptor for Tag {
        fn prepare(&self, details: &mut CallDetails) {
            details.metadata.append("x-tag", self.0);
        }
    }

    struct Counter(AtomicUsize);

    impl CallInterceptor for Counter {
        fn prepare(&self, _details: &mut CallDetails) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_chain_runs_in_registration_order() {
        let mut chain = InterceptorChain::new();
        chain.push(Arc::new(Tag("first")));
        chain.push(Arc::new(Tag("second")));

        let mut details = CallDetails::default();
        chain.prepare(&mut details);

        assert_eq!(
            details.metadata.get_all("x-tag").collect::<Vec<_>>(),
            vec!["first", "second"]
        );
    }

    #[test]
    fn test_every_hook_runs_prepare_once() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let stream = futures::stream::iter(vec![1, 2, 3]);

        let _ = counter.intercept_unary_unary(|_, r: i32| r, CallDetails::default(), 1);
        let _ = counter.intercept_unary_stream(|_, r: i32| r, CallDetails::default(), 1);
        let _ = counter.intercept_stream_unary(|_, s| s, CallDetails::default(), stream.clone());
        let _ = counter.intercept_stream_stream(|_, s| s, CallDetails::default(), stream);

        assert_eq!(counter.0.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_chain_supplies_credentials_to_calls() {
        let token = crate::models::BearerToken::new("deadbeef").unwrap();
        let mut chain = InterceptorChain::new();
        chain.set_credentials(Some(CallCredentials::AccessToken(token.clone())));

        let mut details = CallDetails::default();
        chain.prepare(&mut details);
        assert_eq!(details.credentials, Some(CallCredentials::AccessToken(token)));
    }

    #[test]
    fn test_empty_chain_leaves_tonic_request_alone() {
        use tonic::service::Interceptor;

        let mut chain = InterceptorChain::new();
        let mut req = tonic::Request::new(());
        req.metadata_mut().insert("x-custom", "v".parse().unwrap());

        let out = chain.call(req).unwrap();
        assert_eq!(
            Metadata::from_metadata_map(out.metadata()),
            Metadata::from(vec![("x-custom", "v")])
        );
    }
}
