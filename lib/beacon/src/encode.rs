use crate::value::Params;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Bytes left alone by URI component encoding: alphanumerics and `-_.!~*'()`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(text: &str) -> String {
    utf8_percent_encode(text, COMPONENT).to_string()
}

/// True when percent-decoding `text` would change it, i.e. it already looks encoded.
pub fn looks_encoded(text: &str) -> bool {
    percent_decode_str(text).decode_utf8_lossy() != text
}

/// Append `params` to `base_url` as a query string.
///
/// Keys must be non-empty. Values are kept when truthy or when they are one of
/// `0`, `false`, `null`; empty strings and undefined values are dropped. The
/// base url is not validated.
pub fn encode(params: &Params, base_url: &str) -> String {
    let query = params
        .iter()
        .filter(|(key, value)| {
            !key.is_empty() && (value.is_truthy() || value.is_meaningful_falsy())
        })
        .map(|(key, value)| {
            format!(
                "{}={}",
                encode_component(key),
                encode_component(&value.to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}{query}")
}

/// Prefix a root-relative url (`/path`, but not `//host`) with `origin`.
pub fn resolve(url: &str, origin: Option<&Url>) -> String {
    match origin {
        Some(origin) if url.starts_with('/') && !url.starts_with("//") => {
            format!("{}{}", origin.origin().ascii_serialization(), url)
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{params, ParamValue};

    #[test]
    fn test_encode_keeps_meaningful_falsy() {
        let p = params([
            ("zero", ParamValue::Int(0)),
            ("no", ParamValue::Bool(false)),
            ("nil", ParamValue::Null),
            ("empty", ParamValue::Str(String::new())),
            ("undef", ParamValue::Undefined),
            ("nan", ParamValue::Float(f64::NAN)),
            ("", ParamValue::Int(1)),
        ]);

        assert_eq!(encode(&p, "/1.gif"), "/1.gif?zero=0&no=false&nil=null");
    }

    #[test]
    fn test_encode_escapes_components() {
        let p = params([("a b", "c&d=e"), ("测", "~*'()!")]);
        assert_eq!(
            encode(&p, "/1.gif"),
            "/1.gif?a%20b=c%26d%3De&%E6%B5%8B=~*'()!"
        );
    }

    #[test]
    fn test_encode_separator() {
        let p = params([("a", 1)]);
        assert_eq!(encode(&p, "/1.gif"), "/1.gif?a=1");
        assert_eq!(encode(&p, "/1.gif?v=2"), "/1.gif?v=2&a=1");

        let twice = encode(&p, &encode(&p, "/1.gif"));
        assert_eq!(twice, "/1.gif?a=1&a=1");
        assert_eq!(twice.matches('?').count(), 1);
    }

    #[test]
    fn test_encode_empty_params() {
        assert_eq!(encode(&Params::new(), "/1.gif"), "/1.gif?");
    }

    #[test]
    fn test_encode_malformed_base_passes_through() {
        let p = params([("a", 1)]);
        assert_eq!(encode(&p, "::not a url::"), "::not a url::?a=1");
    }

    #[test]
    fn test_looks_encoded() {
        assert!(looks_encoded("%E6%B5%8B"));
        assert!(!looks_encoded("1"));
        assert!(!looks_encoded("plain"));
        assert!(!looks_encoded("100%"));
    }

    #[test]
    fn test_resolve() -> anyhow::Result<()> {
        let origin = Url::parse("https://example.com:8443/some/page?x=1")?;

        assert_eq!(
            resolve("/1.gif", Some(&origin)),
            "https://example.com:8443/1.gif"
        );
        assert_eq!(
            resolve("//cdn.example.com/log.gif", Some(&origin)),
            "//cdn.example.com/log.gif"
        );
        assert_eq!(resolve("log.gif", Some(&origin)), "log.gif");
        assert_eq!(resolve("/1.gif", None), "/1.gif");
        Ok(())
    }
}
