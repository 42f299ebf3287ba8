pub mod interceptor;
pub mod key_inject;
pub mod redact;

pub use interceptor::{CallInterceptor, ClientInterceptor, InterceptorChain};
pub use key_inject::{inject_credential, CredentialInjector, CredentialTarget};
pub use redact::TraceMode;
