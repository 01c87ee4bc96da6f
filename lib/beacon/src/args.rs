//! Call-boundary argument types.
//!
//! Loosely shaped input is classified exactly once, when it enters `create` or
//! `send`, so nothing past the boundary has to inspect argument types again.

use crate::value::{Globals, ParamValue, Params};

/// What `send` was asked to send.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SendArgs {
    Mapping(Params),
    Pair(String, ParamValue),
    #[default]
    Empty,
}

impl SendArgs {
    /// A single key/value pair. An empty key sends nothing.
    pub fn pair(key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let key = key.into();
        if key.is_empty() {
            return SendArgs::Empty;
        }
        SendArgs::Pair(key, value.into())
    }

    pub fn into_params(self) -> Params {
        match self {
            SendArgs::Mapping(params) => params,
            SendArgs::Pair(key, value) => {
                let mut params = Params::new();
                params.insert(key, value);
                params
            }
            SendArgs::Empty => Params::new(),
        }
    }
}

impl From<Params> for SendArgs {
    fn from(params: Params) -> Self {
        SendArgs::Mapping(params)
    }
}

/// A bare key: the value is undefined.
impl From<&str> for SendArgs {
    fn from(key: &str) -> Self {
        SendArgs::pair(key, ParamValue::Undefined)
    }
}

impl<V: Into<ParamValue>> From<(&str, V)> for SendArgs {
    fn from((key, value): (&str, V)) -> Self {
        SendArgs::pair(key, value)
    }
}

impl<V: Into<ParamValue>> From<(String, V)> for SendArgs {
    fn from((key, value): (String, V)) -> Self {
        SendArgs::pair(key, value)
    }
}

impl From<()> for SendArgs {
    fn from(_: ()) -> Self {
        SendArgs::Empty
    }
}

/// The `url` argument of `create`.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlInput {
    Missing,
    Text(String),
    /// Something other than text; carries a description for diagnostics.
    NotText(String),
}

impl UrlInput {
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            None => UrlInput::Missing,
            Some(serde_json::Value::String(s)) => UrlInput::Text(s.clone()),
            Some(other) => UrlInput::NotText(other.to_string()),
        }
    }

    /// The url to use. Anything that is not text degrades to an empty url.
    pub fn into_url(self) -> String {
        match self {
            UrlInput::Text(url) => url,
            UrlInput::Missing | UrlInput::NotText(_) => String::new(),
        }
    }
}

impl From<&str> for UrlInput {
    fn from(url: &str) -> Self {
        UrlInput::Text(url.to_string())
    }
}

impl From<String> for UrlInput {
    fn from(url: String) -> Self {
        UrlInput::Text(url)
    }
}

impl From<Option<&str>> for UrlInput {
    fn from(url: Option<&str>) -> Self {
        url.map_or(UrlInput::Missing, UrlInput::from)
    }
}

/// The `globals` argument of `create`.
#[derive(Debug, Clone)]
pub enum GlobalsInput {
    Missing,
    Map(Globals),
    /// Something other than a mapping; carries a description for diagnostics.
    NotMap(String),
}

impl GlobalsInput {
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            None => GlobalsInput::Missing,
            Some(serde_json::Value::Object(map)) => GlobalsInput::Map(Globals::from_json(map)),
            Some(other) => GlobalsInput::NotMap(other.to_string()),
        }
    }

    /// The globals to use. Anything that is not a mapping degrades to none.
    pub fn into_globals(self) -> Globals {
        match self {
            GlobalsInput::Map(globals) => globals,
            GlobalsInput::Missing | GlobalsInput::NotMap(_) => Globals::new(),
        }
    }
}

impl From<Globals> for GlobalsInput {
    fn from(globals: Globals) -> Self {
        GlobalsInput::Map(globals)
    }
}

impl From<Option<Globals>> for GlobalsInput {
    fn from(globals: Option<Globals>) -> Self {
        globals.map_or(GlobalsInput::Missing, GlobalsInput::Map)
    }
}

impl From<()> for GlobalsInput {
    fn from(_: ()) -> Self {
        GlobalsInput::Missing
    }
}
