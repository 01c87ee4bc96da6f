use anyhow::{anyhow, Result};
use beacon::{Globals, ParamValue, Params};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global value that is replaced by the current unix time in milliseconds on every send.
const NOW: &str = "@now";

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub globals: Globals,
    pub params: Params,
    pub origin: Option<String>,
    pub redirect: Option<String>,
    pub debug: bool,
    pub wait: Duration,
}

pub fn command() -> Command<'static> {
    Command::new("sendlog")
        .version(beacon::VERSION)
        .about("Send one telemetry beacon and wait for it to settle")
        .arg(
            Arg::new("URL")
                .help("Collection url, e.g. https://example.com/1.gif or /1.gif with --origin")
                .required(true),
        )
        .arg(
            Arg::new("global")
                .help("Global parameter; a value of @now is the send time in milliseconds")
                .short('g')
                .long("global")
                .value_name("KEY=VALUE")
                .takes_value(true)
                .multiple_occurrences(true),
        )
        .arg(
            Arg::new("param")
                .help("Event parameter, overrides a global with the same key")
                .short('p')
                .long("param")
                .value_name("KEY=VALUE")
                .takes_value(true)
                .multiple_occurrences(true),
        )
        .arg(
            Arg::new("origin")
                .help("Origin that root-relative urls are resolved against")
                .long("origin")
                .value_name("URL")
                .takes_value(true),
        )
        .arg(
            Arg::new("redirect")
                .help("Send the beacon here instead of URL")
                .long("redirect")
                .value_name("URL")
                .takes_value(true),
        )
        .arg(
            Arg::new("debug")
                .help("Report suspicious arguments and parameters")
                .long("debug"),
        )
        .arg(
            Arg::new("wait-ms")
                .help("How long to wait for the request to settle")
                .long("wait-ms")
                .value_name("N")
                .takes_value(true)
                .default_value("5000")
                .value_parser(value_parser!(u64)),
        )
}

pub fn parse(matches: &ArgMatches) -> Result<Options> {
    let url = matches
        .get_one::<String>("URL")
        .cloned()
        .ok_or_else(|| anyhow!("missing URL"))?;

    let mut globals = Globals::new();
    for pair in values(matches, "global")? {
        let (key, value) = split_pair(&pair)?;
        globals = if value == NOW {
            globals.with_lazy(key, || ParamValue::Int(now_millis()))
        } else {
            globals.with(key, ParamValue::parse_lossy(value))
        };
    }

    let mut params = Params::new();
    for pair in values(matches, "param")? {
        let (key, value) = parse_pair(&pair)?;
        params.insert(key, value);
    }

    Ok(Options {
        url,
        globals,
        params,
        origin: matches.get_one::<String>("origin").cloned(),
        redirect: matches.get_one::<String>("redirect").cloned(),
        debug: matches.contains_id("debug"),
        wait: Duration::from_millis(matches.get_one::<u64>("wait-ms").copied().unwrap_or(5000)),
    })
}

fn values(matches: &ArgMatches, id: &str) -> Result<Vec<String>> {
    let values = matches
        .try_get_many::<String>(id)
        .map_err(|err| anyhow!("failed to read --{id}: {err}"))?;
    Ok(values.map(|v| v.cloned().collect()).unwrap_or_default())
}

fn split_pair(text: &str) -> Result<(&str, &str)> {
    text.split_once('=')
        .ok_or_else(|| anyhow!("Invalid parameter: {}, expected KEY=VALUE", text))
}

/// Parse `key=value`, typing the value where it looks like a number, boolean or null.
pub fn parse_pair(text: &str) -> Result<(String, ParamValue)> {
    let (key, value) = split_pair(text)?;
    Ok((key.to_string(), ParamValue::parse_lossy(value)))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon::GlobalParam;

    fn options(args: &[&str]) -> Result<Options> {
        let matches = command().try_get_matches_from(args)?;
        parse(&matches)
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("time=1").unwrap(),
            ("time".to_string(), ParamValue::Int(1))
        );
        assert_eq!(
            parse_pair("page=home=2").unwrap(),
            ("page".to_string(), ParamValue::from("home=2"))
        );
        assert_eq!(
            parse_pair("k=").unwrap(),
            ("k".to_string(), ParamValue::from(""))
        );
        assert!(parse_pair("novalue").is_err());
    }

    #[test]
    fn test_parse_full_command_line() -> Result<()> {
        let opts = options(&[
            "sendlog",
            "/1.gif",
            "-g",
            "time=12345",
            "-g",
            "ts=@now",
            "-p",
            "time=1",
            "--param",
            "ok=true",
            "--origin",
            "http://127.0.0.1:8080",
            "--debug",
            "--wait-ms",
            "250",
        ])?;

        assert_eq!(opts.url, "/1.gif");
        assert!(matches!(
            opts.globals.get("time"),
            Some(GlobalParam::Value(ParamValue::Int(12345)))
        ));
        assert!(opts.globals.get("ts").map_or(false, GlobalParam::is_lazy));
        assert_eq!(opts.params.get("time"), Some(&ParamValue::Int(1)));
        assert_eq!(opts.params.get("ok"), Some(&ParamValue::Bool(true)));
        assert_eq!(opts.origin.as_deref(), Some("http://127.0.0.1:8080"));
        assert!(opts.debug);
        assert_eq!(opts.wait, Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let opts = options(&["sendlog", "https://example.com/1.gif"])?;

        assert!(opts.globals.is_empty());
        assert!(opts.params.is_empty());
        assert!(opts.origin.is_none());
        assert!(opts.redirect.is_none());
        assert!(!opts.debug);
        assert_eq!(opts.wait, Duration::from_millis(5000));
        Ok(())
    }

    #[test]
    fn test_missing_url_rejected() {
        assert!(command().try_get_matches_from(["sendlog"]).is_err());
    }

    #[test]
    fn test_bad_pair_rejected() {
        let err = options(&["sendlog", "/1.gif", "-p", "oops"]).unwrap_err();
        assert!(err.to_string().contains("Invalid parameter: oops"));
    }
}
