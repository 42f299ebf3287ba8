pub mod channel;
pub mod proto;
pub mod session;

pub use channel::{ChannelBuilder, ConnectionString, InterceptedChannel};
pub use session::{DataFrame, SessionBuilder, SparkSession};
