pub mod error_handler;
pub mod feed_client;
pub mod message_router;
pub mod runner;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use feed_client::{FeedConnection, FeedConnector, SubscriptionRequest, TransportError, WebSocketConnector};
pub use message_router::{classify, IgnoreReason, RoutedMessage};
pub use runner::{AttemptFailure, RetryPolicy, RetryingSessionRunner, RunnerError};
pub use session::{SessionEnd, SessionError, SessionSummary, StreamSession};
