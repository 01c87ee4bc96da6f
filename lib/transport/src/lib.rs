#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::Http;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::MockTransport;

mod transport;
pub use transport::{Outcome, Settle, Transport};
