use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A single scalar carried on the query string.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    /// No value at all, as opposed to an explicit `Null`.
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Insertion-ordered parameter mapping. Order is preserved on the wire.
pub type Params = IndexMap<String, ParamValue>;

impl ParamValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Null | ParamValue::Undefined => false,
            ParamValue::Bool(b) => *b,
            ParamValue::Int(i) => *i != 0,
            ParamValue::Float(f) => *f != 0.0 && !f.is_nan(),
            ParamValue::Str(s) => !s.is_empty(),
        }
    }

    /// `0`, `false` and `null`: falsy, but still worth sending.
    pub fn is_meaningful_falsy(&self) -> bool {
        match self {
            ParamValue::Null | ParamValue::Bool(false) | ParamValue::Int(0) => true,
            ParamValue::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    /// Missing, empty, or the literal text `undefined`.
    pub fn is_blank(&self) -> bool {
        match self {
            ParamValue::Undefined => true,
            ParamValue::Str(s) => s.is_empty() || s == "undefined",
            _ => false,
        }
    }

    /// Convert a JSON value. Arrays and objects are carried as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ParamValue::Str(s.clone()),
            other => ParamValue::Str(other.to_string()),
        }
    }

    /// Best-effort typing of free text, e.g. a command line argument.
    pub fn parse_lossy(text: &str) -> Self {
        match text {
            "null" => return ParamValue::Null,
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return ParamValue::Int(i);
        }
        // Only numeric-looking text, so words like "inf" or "NaN" stay strings.
        if text.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = text.parse::<f64>() {
                return ParamValue::Float(f);
            }
        }
        ParamValue::Str(text.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("null"),
            ParamValue::Undefined => f.write_str("undefined"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => {
                if v.is_nan() {
                    f.write_str("NaN")
                } else if v.is_infinite() {
                    f.write_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
                } else if *v == 0.0 {
                    // Covers -0.0 as well.
                    f.write_str("0")
                } else if v.abs() >= 1e21 || v.abs() < 1e-6 {
                    // Exponent form, with an explicit sign on positive exponents.
                    let sci = format!("{v:e}");
                    match sci.split_once('e') {
                        Some((mantissa, exp)) if !exp.starts_with('-') => {
                            write!(f, "{mantissa}e+{exp}")
                        }
                        _ => f.write_str(&sci),
                    }
                } else if v.fract() == 0.0 {
                    write!(f, "{v:.0}")
                } else {
                    write!(f, "{v}")
                }
            }
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// Build a [`Params`] mapping from key/value pairs.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub type LazyValue = Arc<dyn Fn() -> ParamValue + Send + Sync>;

/// A global parameter: either fixed, or computed again on every send.
#[derive(Clone)]
pub enum GlobalParam {
    Value(ParamValue),
    Lazy(LazyValue),
}

impl GlobalParam {
    pub fn resolve(&self) -> ParamValue {
        match self {
            GlobalParam::Value(v) => v.clone(),
            GlobalParam::Lazy(f) => f(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, GlobalParam::Lazy(_))
    }
}

impl fmt::Debug for GlobalParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalParam::Value(v) => f.debug_tuple("Value").field(v).finish(),
            GlobalParam::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<ParamValue> for GlobalParam {
    fn from(value: ParamValue) -> Self {
        GlobalParam::Value(value)
    }
}

/// The per-beacon global parameter set.
#[derive(Debug, Clone, Default)]
pub struct Globals(IndexMap<String, GlobalParam>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, GlobalParam::Value(value.into()));
        self
    }

    pub fn with_lazy<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> ParamValue + Send + Sync + 'static,
    {
        self.insert(key, GlobalParam::Lazy(Arc::new(f)));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: GlobalParam) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&GlobalParam> {
        self.0.get(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, GlobalParam> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        map.iter()
            .map(|(k, v)| (k.clone(), ParamValue::from_json(v)))
            .collect()
    }
}

impl FromIterator<(String, ParamValue)> for Globals {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Globals(
            iter.into_iter()
                .map(|(k, v)| (k, GlobalParam::Value(v)))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Globals {
    type Item = (&'a String, &'a GlobalParam);
    type IntoIter = indexmap::map::Iter<'a, String, GlobalParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
