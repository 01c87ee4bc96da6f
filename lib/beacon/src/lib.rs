//! Fire-and-forget telemetry beacons.
//!
//! A [`Tracker`] creates [`Beacon`]s bound to a collection url and a set of
//! global parameters. Every [`Beacon::send`] merges those globals with the
//! event's own parameters, encodes them onto the url as a query string and
//! hands the result to a [`transport::Transport`]. Nothing is reported back.
//!
//! ```ignore
//! let tracker = Tracker::builder(Arc::new(Http::current()?)).build();
//! tracker
//!     .create("/1.gif", Globals::new().with("page", "home"))
//!     .send(("click", "buy"));
//! ```

mod args;
pub mod config;
pub mod debug;
mod dispatch;
pub mod encode;
pub mod intercept;
mod merge;
pub mod registry;
pub mod sink;
mod tracker;
mod value;

pub use args::{GlobalsInput, SendArgs, UrlInput};
pub use config::TrackerConfig;
pub use dispatch::{DispatchHandle, Dispatcher};
pub use encode::{encode, resolve};
pub use intercept::{Call, InterceptError, Interceptors, Observer, Op, Target};
pub use merge::merge;
pub use registry::{HandleKey, HandleRegistry, LiveHandles, RegistryError};
pub use sink::{AdvisorySink, LogSink, RecordingSink};
pub use tracker::{Beacon, Tracker, TrackerBuilder};
pub use value::{params, GlobalParam, Globals, LazyValue, ParamValue, Params};

/// Crate version, as reported by `sendlog --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
