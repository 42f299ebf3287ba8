pub mod metadata;
pub mod token;

pub use metadata::{CallCredentials, CallDetails, Metadata};
pub use token::BearerToken;
