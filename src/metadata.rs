//! Request/environment metadata attached to profile artifacts.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTimestamp {
    pub sec: i64,
    pub usec: i64,
}

/// Snapshot taken once at the end of a test. Never updated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub url: Option<String>,
    #[serde(rename = "SERVER")]
    pub server: BTreeMap<String, serde_json::Value>,
    pub get: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub simple_url: Option<String>,
    pub request_ts: RequestTimestamp,
    pub request_ts_micro: RequestTimestamp,
    pub request_date: String,
}

pub trait MetadataProvider {
    fn capture(&self) -> RequestMetadata;
}

/// A fixed snapshot; every capture returns the same value.
impl MetadataProvider for RequestMetadata {
    fn capture(&self) -> RequestMetadata {
        self.clone()
    }
}

/// Describes the current process: its command line, environment and start
/// time.
#[derive(Debug, Clone)]
pub struct ProcessMetadata {
    started_at: OffsetDateTime,
    argv: Vec<String>,
}

impl ProcessMetadata {
    /// Records "now" as the request start time.
    pub fn new() -> Self {
        Self::with_args(std::env::args(), OffsetDateTime::now_utc())
    }

    pub fn with_args(argv: impl IntoIterator<Item = String>, started_at: OffsetDateTime) -> Self {
        Self {
            started_at,
            argv: argv.into_iter().collect(),
        }
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    /// `basename(argv[0]) args...`, or `None` without an argv.
    pub fn invocation(&self) -> Option<String> {
        let (program, args) = self.argv.split_first()?;
        let cmd = Path::new(program)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.clone());
        let mut parts = Vec::with_capacity(self.argv.len());
        parts.push(cmd);
        parts.extend(args.iter().cloned());
        Some(parts.join(" "))
    }
}

impl Default for ProcessMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProvider for ProcessMetadata {
    fn capture(&self) -> RequestMetadata {
        let env: BTreeMap<String, String> = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        snapshot(self, env)
    }
}

fn snapshot(process: &ProcessMetadata, env: BTreeMap<String, String>) -> RequestMetadata {
    let url = process.invocation();
    let sec = process.started_at.unix_timestamp();
    let usec = i64::from(process.started_at.microsecond());

    let mut server: BTreeMap<String, serde_json::Value> = env
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    server.insert("argv".to_string(), serde_json::json!(process.argv));
    server.insert("argc".to_string(), serde_json::json!(process.argv.len()));
    server.insert("REQUEST_TIME".to_string(), serde_json::json!(sec));
    server.insert(
        "REQUEST_TIME_FLOAT".to_string(),
        serde_json::json!(sec as f64 + usec as f64 / 1_000_000.0),
    );

    RequestMetadata {
        simple_url: url.clone(),
        url,
        server,
        get: BTreeMap::new(),
        env,
        request_ts: RequestTimestamp { sec, usec: 0 },
        request_ts_micro: RequestTimestamp { sec, usec },
        request_date: request_date(process.started_at),
    }
}

/// Day-precision date, `YYYY-MM-DD`.
pub fn request_date(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]");
    at.format(&format).unwrap_or_else(|err| {
        tracing::warn!("failed to format request date: {err}");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn process() -> ProcessMetadata {
        ProcessMetadata::with_args(
            ["/usr/local/bin/phpunit".to_string(), "--filter".to_string(), "FooTest".to_string()],
            datetime!(2024-03-05 10:20:30.123456 UTC),
        )
    }

    #[test]
    fn invocation_uses_program_basename() {
        assert_eq!(process().invocation().as_deref(), Some("phpunit --filter FooTest"));
        let bare = ProcessMetadata::with_args(Vec::new(), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(bare.invocation(), None);
    }

    #[test]
    fn snapshot_records_request_times() {
        let env = BTreeMap::from([("HOME".to_string(), "/root".to_string())]);
        let meta = snapshot(&process(), env);

        assert_eq!(meta.url.as_deref(), Some("phpunit --filter FooTest"));
        assert_eq!(meta.simple_url, meta.url);
        assert_eq!(meta.request_ts.sec, 1_709_634_030);
        assert_eq!(meta.request_ts.usec, 0);
        assert_eq!(meta.request_ts_micro.sec, 1_709_634_030);
        assert_eq!(meta.request_ts_micro.usec, 123_456);
        assert_eq!(meta.request_date, "2024-03-05");
        assert_eq!(meta.env.get("HOME").map(String::as_str), Some("/root"));
        assert_eq!(meta.server.get("HOME"), Some(&serde_json::json!("/root")));
        assert_eq!(meta.server.get("REQUEST_TIME"), Some(&serde_json::json!(1_709_634_030)));
        assert!(meta.get.is_empty());
    }

    #[test]
    fn metadata_serializes_with_server_key() {
        let meta = snapshot(&process(), BTreeMap::new());
        let value = serde_json::to_value(&meta).expect("encode");
        assert!(value.get("SERVER").is_some());
        assert_eq!(value["request_ts_micro"]["usec"], serde_json::json!(123_456));
        assert_eq!(value["request_date"], serde_json::json!("2024-03-05"));
    }
}
