use crate::args::{GlobalsInput, SendArgs, UrlInput};
use crate::config::TrackerConfig;
use crate::debug;
use crate::dispatch::Dispatcher;
use crate::encode::{encode, resolve};
use crate::intercept::{Call, InterceptError, Interceptors};
use crate::merge::{overlay, resolve_globals};
use crate::registry::{HandleRegistry, LiveHandles};
use crate::sink::{AdvisorySink, LogSink};
use crate::value::{Globals, Params};
use std::fmt;
use std::sync::Arc;
use transport::Transport;

struct Inner {
    config: TrackerConfig,
    dispatcher: Dispatcher,
    interceptors: Interceptors,
    sink: Arc<dyn AdvisorySink>,
}

/// Creates beacons and carries everything they share: configuration, the
/// dispatcher and the interception chain.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl Tracker {
    pub fn builder(transport: Arc<dyn Transport>) -> TrackerBuilder {
        TrackerBuilder::new(transport)
    }

    /// Bind a beacon to `url` and `globals`.
    ///
    /// Never fails: a url that is not text becomes empty and globals that are
    /// not a mapping are ignored. With a redirect url configured, the beacon
    /// targets that instead.
    pub fn create(&self, url: impl Into<UrlInput>, globals: impl Into<GlobalsInput>) -> Beacon {
        let url = url.into();
        let globals = globals.into();
        self.inner.interceptors.observe(&Call::Create {
            tracker: self,
            url: &url,
            globals: &globals,
        });

        let url = match &self.inner.config.redirect_url {
            Some(redirect) => redirect.clone(),
            None => url.into_url(),
        };

        Beacon {
            tracker: self.clone(),
            url,
            globals: globals.into_globals(),
        }
    }

    /// Append `params` to `url` as a query string.
    pub fn encode(&self, params: &Params, url: &str) -> String {
        self.inner.interceptors.observe(&Call::Encode {
            tracker: self,
            params,
            url,
        });
        encode(params, url)
    }

    /// Build the final request url for `params` and fire it.
    pub fn dispatch(&self, params: &Params, url: &str) {
        self.inner.interceptors.observe(&Call::Dispatch {
            tracker: self,
            params,
            url,
        });

        let target = resolve(url, self.inner.config.origin.as_ref());
        let target = self.encode(params, &target);
        self.inner.dispatcher.dispatch(target);
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    pub fn sink(&self) -> &Arc<dyn AdvisorySink> {
        &self.inner.sink
    }

    /// Number of dispatches that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.inner.dispatcher.in_flight()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.inner.config)
            .field("transport", &self.inner.dispatcher.transport().name())
            .field("interceptors", &self.inner.interceptors)
            .finish()
    }
}

/// One target url plus its global parameters.
#[derive(Clone, Debug)]
pub struct Beacon {
    tracker: Tracker,
    url: String,
    globals: Globals,
}

impl Beacon {
    /// Send one event. Returns immediately, whatever happens to the request.
    ///
    /// ```ignore
    /// beacon.send(("page", "home")).send(params([("time", 1)]));
    /// ```
    pub fn send(&self, args: impl Into<SendArgs>) -> &Self {
        let args = args.into();
        self.tracker.inner.interceptors.observe(&Call::Send {
            beacon: self,
            args: &args,
        });

        let params = self.merge(&args.into_params());
        self.tracker.dispatch(&params, &self.url);
        self
    }

    /// Fresh parameters for one send: resolved globals overlaid with `params`.
    ///
    /// Lazy globals are resolved once, before observers run, so every observer
    /// sees the same values that end up on the wire.
    pub fn merge(&self, params: &Params) -> Params {
        let resolved = resolve_globals(&self.globals);
        self.tracker.inner.interceptors.observe(&Call::Merge {
            beacon: self,
            params,
            globals: &resolved,
        });
        overlay(resolved, params)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }
}

pub struct TrackerBuilder {
    transport: Arc<dyn Transport>,
    config: TrackerConfig,
    registry: Option<Arc<dyn HandleRegistry>>,
    sink: Option<Arc<dyn AdvisorySink>>,
    interceptors: Interceptors,
}

impl TrackerBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        TrackerBuilder {
            transport,
            config: TrackerConfig::default(),
            registry: None,
            sink: None,
            interceptors: Interceptors::new(),
        }
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Track live handles here instead of in the process-wide registry.
    pub fn registry(mut self, registry: Arc<dyn HandleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn AdvisorySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    pub fn intercept<F>(mut self, name: &str, observer: F) -> Result<Self, InterceptError>
    where
        F: Fn(&Call<'_>) + Send + Sync + 'static,
    {
        self.interceptors.intercept(name, observer)?;
        Ok(self)
    }

    pub fn build(self) -> Tracker {
        let registry = self
            .registry
            .unwrap_or_else(|| LiveHandles::global() as Arc<dyn HandleRegistry>);
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(LogSink) as Arc<dyn AdvisorySink>);

        // Validation goes in first so observers added by the caller wrap it.
        let mut interceptors = Interceptors::new();
        if self.config.debug {
            debug::install(&mut interceptors, &self.config, sink.clone());
        }
        interceptors.extend(self.interceptors);

        #[cfg(debug_assertions)]
        log::debug!("tracker ready: debug={}", self.config.debug);

        Tracker {
            inner: Arc::new(Inner {
                config: self.config,
                dispatcher: Dispatcher::new(registry, self.transport),
                interceptors,
                sink,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::{Op, Target};
    use crate::sink::RecordingSink;
    use crate::value::{params, ParamValue};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use transport::{MockTransport, Outcome, Settle};

    /// Transport that records every url and keeps the settle tokens parked.
    fn recording_transport() -> (MockTransport, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<Settle>>>) {
        let urls = Arc::new(Mutex::new(Vec::new()));
        let parked = Arc::new(Mutex::new(Vec::new()));
        let (u, p) = (urls.clone(), parked.clone());

        let mut transport = MockTransport::new();
        transport.expect_fire().returning(move |url, settle| {
            u.lock().unwrap().push(url);
            p.lock().unwrap().push(settle);
        });
        transport.expect_name().return_const("mock");
        (transport, urls, parked)
    }

    fn tracker_with(transport: MockTransport) -> Tracker {
        Tracker::builder(Arc::new(transport))
            .registry(Arc::new(LiveHandles::new()))
            .build()
    }

    #[test]
    fn test_send_fires_merged_url() {
        let (transport, urls, _parked) = recording_transport();
        let tracker = tracker_with(transport);

        tracker
            .create("/1.gif", Globals::new().with("page", "home"))
            .send(("a", 1));

        assert_eq!(*urls.lock().unwrap(), vec!["/1.gif?page=home&a=1"]);
    }

    #[test]
    fn test_send_returns_self_for_chaining() {
        let (transport, urls, _parked) = recording_transport();
        let tracker = tracker_with(transport);
        let beacon = tracker.create("/1.gif", ());

        let returned = beacon.send(("a", 1)).send(("b", 2));

        assert!(std::ptr::eq(returned, &beacon));
        assert_eq!(
            *urls.lock().unwrap(),
            vec!["/1.gif?a=1", "/1.gif?b=2"]
        );
    }

    #[test]
    fn test_send_argument_shapes() {
        let (transport, urls, _parked) = recording_transport();
        let tracker = tracker_with(transport);
        let beacon = tracker.create("/1.gif?v=2", ());

        beacon.send(params([("x", "1"), ("y", "2")]));
        beacon.send("");
        beacon.send(());
        beacon.send("bare");

        assert_eq!(
            *urls.lock().unwrap(),
            vec!["/1.gif?v=2&x=1&y=2", "/1.gif?v=2&", "/1.gif?v=2&", "/1.gif?v=2&"]
        );
    }

    #[test]
    fn test_send_observer_sees_args_before_dispatch() {
        let fired = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(None));

        let mut transport = MockTransport::new();
        let f = fired.clone();
        transport
            .expect_fire()
            .times(1)
            .returning(move |_url, settle| {
                f.store(true, Ordering::SeqCst);
                settle.settle(Outcome::Loaded);
            });

        let (f, s) = (fired.clone(), seen.clone());
        let tracker = Tracker::builder(Arc::new(transport))
            .registry(Arc::new(LiveHandles::new()))
            .intercept("instance.send", move |call| {
                if let Call::Send { args, .. } = call {
                    assert!(!f.load(Ordering::SeqCst), "observer ran after dispatch");
                    *s.lock().unwrap() = Some((*args).clone());
                }
            })
            .unwrap()
            .build();

        let beacon = tracker.create("/1.gif", ());
        let returned = beacon.send(("a", 1));

        assert!(std::ptr::eq(returned, &beacon));
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(
            *seen.lock().unwrap(),
            Some(SendArgs::Pair("a".to_string(), ParamValue::Int(1)))
        );
    }

    #[test]
    fn test_observers_run_newest_first() {
        let (transport, _urls, _parked) = recording_transport();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (order.clone(), order.clone());

        let tracker = Tracker::builder(Arc::new(transport))
            .registry(Arc::new(LiveHandles::new()))
            .intercept("factory.create", move |_| first.lock().unwrap().push("first"))
            .unwrap()
            .intercept("factory.create", move |_| second.lock().unwrap().push("second"))
            .unwrap()
            .build();

        tracker.create("/1.gif", ());
        assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn test_every_operation_is_observed() {
        let (transport, _urls, _parked) = recording_transport();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut builder = Tracker::builder(Arc::new(transport)).registry(Arc::new(LiveHandles::new()));
        for name in ["factory.create", "factory.encode", "factory.dispatch", "instance.send", "instance.merge"] {
            let seen = seen.clone();
            builder = builder
                .intercept(name, move |call| seen.lock().unwrap().push(call.target()))
                .unwrap();
        }
        let tracker = builder.build();

        tracker.create("/1.gif", ()).send(("a", 1));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Target::Factory(Op::Create),
                Target::Instance(Op::Send),
                Target::Instance(Op::Merge),
                Target::Factory(Op::Dispatch),
                Target::Factory(Op::Encode),
            ]
        );
    }

    #[test]
    fn test_intercept_rejects_bad_target() {
        let (transport, _urls, _parked) = recording_transport();
        let result = Tracker::builder(Arc::new(transport)).intercept("test.xxoo", |_| {});
        assert!(matches!(result, Err(InterceptError::InvalidTarget(_))));
    }

    #[test]
    fn test_create_degrades_bad_input() {
        let (transport, urls, _parked) = recording_transport();
        let tracker = tracker_with(transport);

        let json = serde_json::json!({ "url": 42, "globals": [1, 2] });
        let beacon = tracker.create(
            UrlInput::from_json(json.get("url")),
            GlobalsInput::from_json(json.get("globals")),
        );
        assert_eq!(beacon.url(), "");
        assert!(beacon.globals().is_empty());

        beacon.send(("a", 1));
        assert_eq!(*urls.lock().unwrap(), vec!["?a=1"]);
    }

    #[test]
    fn test_redirect_url_overrides_target() {
        let (transport, urls, _parked) = recording_transport();
        let config = TrackerConfig {
            redirect_url: Some("http://localhost:8080/debug.gif".to_string()),
            ..Default::default()
        };
        let tracker = Tracker::builder(Arc::new(transport))
            .registry(Arc::new(LiveHandles::new()))
            .config(config)
            .build();

        let beacon = tracker.create("/1.gif", ());
        assert_eq!(beacon.url(), "http://localhost:8080/debug.gif");

        beacon.send(("a", 1));
        assert_eq!(
            *urls.lock().unwrap(),
            vec!["http://localhost:8080/debug.gif?a=1"]
        );
    }

    #[test]
    fn test_root_relative_url_resolved_against_origin() {
        let (transport, urls, _parked) = recording_transport();
        let config = TrackerConfig::default()
            .with_origin("https://example.com/some/page")
            .unwrap();
        let tracker = Tracker::builder(Arc::new(transport))
            .registry(Arc::new(LiveHandles::new()))
            .config(config)
            .build();

        tracker
            .create("/1.gif", Globals::new().with("time", 12345))
            .send(params([("time", 1)]));
        tracker.create("//cdn.example.com/1.gif", ()).send(("a", 1));

        assert_eq!(
            *urls.lock().unwrap(),
            vec![
                "https://example.com/1.gif?time=1",
                "//cdn.example.com/1.gif?a=1",
            ]
        );
    }

    #[test]
    fn test_lazy_global_resolved_once_per_send() {
        let (transport, urls, _parked) = recording_transport();
        let tracker = tracker_with(transport);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let beacon = tracker.create(
            "/1.gif",
            Globals::new().with_lazy("n", move || {
                ParamValue::from(c.fetch_add(1, Ordering::SeqCst) as i64 + 1)
            }),
        );
        beacon.send(()).send(());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*urls.lock().unwrap(), vec!["/1.gif?n=1", "/1.gif?n=2"]);
    }

    #[test]
    fn test_in_flight_follows_settlement() {
        let (transport, _urls, parked) = recording_transport();
        let tracker = tracker_with(transport);
        let beacon = tracker.create("/1.gif", ());

        beacon.send(("a", 1)).send(("a", 2));
        assert_eq!(tracker.in_flight(), 2);

        parked.lock().unwrap().remove(0).settle(Outcome::Errored);
        assert_eq!(tracker.in_flight(), 1);

        parked.lock().unwrap().clear();
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_debug_layer_reports_without_changing_outcome() {
        let (transport, urls, _parked) = recording_transport();
        let sink = Arc::new(RecordingSink::new());
        let tracker = Tracker::builder(Arc::new(transport))
            .registry(Arc::new(LiveHandles::new()))
            .sink(sink.clone())
            .debug(true)
            .build();

        tracker.create("/1.gif", ()).send(("k", ""));

        assert_eq!(*urls.lock().unwrap(), vec!["/1.gif?"]);
        assert_eq!(sink.warnings().len(), 1);
        assert!(sink.warnings()[0].contains('k'));
        assert!(tracker.config().debug);
    }
}
