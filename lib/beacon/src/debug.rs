//! Advisory validation.
//!
//! Everything here is attached through the interception chain and only ever
//! reports to an [`AdvisorySink`]. A beacon that fails a check is still sent,
//! with the same data.

use crate::args::{GlobalsInput, UrlInput};
use crate::config::TrackerConfig;
use crate::encode::{encode, looks_encoded, resolve};
use crate::intercept::{Call, Interceptors, Op, Target};
use crate::sink::AdvisorySink;
use crate::value::{ParamValue, Params};
use std::sync::Arc;
use url::Url;

/// Attach the create, merge and dispatch checks to `interceptors`.
///
/// Per-parameter checks run on dispatch rather than merge so that lazy
/// globals are judged by the value they actually produced for this send.
pub fn install(interceptors: &mut Interceptors, config: &TrackerConfig, sink: Arc<dyn AdvisorySink>) {
    let create_sink = sink.clone();
    interceptors.attach(
        Target::Factory(Op::Create),
        Arc::new(move |call: &Call<'_>| {
            if let Call::Create { url, globals, .. } = call {
                check_create(url, globals, create_sink.as_ref());
            }
        }),
    );

    let merge_sink = sink.clone();
    interceptors.attach(
        Target::Instance(Op::Merge),
        Arc::new(move |call: &Call<'_>| {
            if let Call::Merge { params, globals, .. } = call {
                check_duplicates(globals, params, merge_sink.as_ref());
            }
        }),
    );

    let param_max_length = config.param_max_length;
    let url_max_length = config.url_max_length;
    let origin = config.origin.clone();
    interceptors.attach(
        Target::Factory(Op::Dispatch),
        Arc::new(move |call: &Call<'_>| {
            if let Call::Dispatch { params, url, .. } = call {
                check_params(params, param_max_length, sink.as_ref());
                check_url_length(params, url, origin.as_ref(), url_max_length, sink.as_ref());
            }
        }),
    );

    #[cfg(debug_assertions)]
    log::debug!(
        "advisory validation installed: url_max_length={url_max_length}, param_max_length={param_max_length}"
    );
}

fn check_create(url: &UrlInput, globals: &GlobalsInput, sink: &dyn AdvisorySink) {
    match url {
        UrlInput::Missing => sink.error("create(url): url must not be empty"),
        UrlInput::NotText(_) => sink.error("create(url): url must be a non-empty string"),
        UrlInput::Text(text) if text.is_empty() => {
            sink.error("create(url): url must be a non-empty string")
        }
        UrlInput::Text(_) => {
            if let GlobalsInput::NotMap(_) = globals {
                sink.error("create(url, globals): globals must be a key/value mapping");
            }
        }
    }
}

fn check_duplicates(globals: &Params, params: &Params, sink: &dyn AdvisorySink) {
    for (key, old) in globals {
        if let Some(value) = params.get(key) {
            sink.warn(&format!(
                "duplicate global parameter \"{key}\" in send, value changes from \"{old}\" to \"{value}\""
            ));
        }
    }
}

fn check_params(params: &Params, param_max_length: usize, sink: &dyn AdvisorySink) {
    for (key, value) in params {
        let rendered = value.to_string();
        let length = rendered.chars().count();

        if key.is_empty() {
            sink.warn("empty parameter");
        } else if value.is_blank() {
            sink.warn(&format!("empty parameter: {key}"));
        } else if length > param_max_length {
            sink.warn(&format!(
                "overlong parameter: {key}={rendered}, length {length}"
            ));
        } else if looks_encoded(key) {
            sink.warn(&format!("percent-encoded key: {key}"));
        } else if matches!(value, ParamValue::Str(_)) && looks_encoded(&rendered) {
            sink.warn(&format!("percent-encoded value, key: {key}"));
        }
    }
}

fn check_url_length(
    params: &Params,
    url: &str,
    origin: Option<&Url>,
    url_max_length: usize,
    sink: &dyn AdvisorySink,
) {
    let length = encode(params, &resolve(url, origin)).chars().count();
    if length > url_max_length {
        sink.warn(&format!("beacon url too long, length {length}"));
    }
}
