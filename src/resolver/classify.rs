// Source classification and normalization
//
// The provider's `sources` field has taken several shapes over time:
// 1. a string that already is a manifest URL
// 2. a string holding a JSON array ("looks encrypted but isn't")
// 3. a string holding an encrypted envelope
// 4. a plain JSON array of {file, type|quality}
// Classification is pure; decrypting variant 3 is left to the orchestrator.

use serde_json::Value;
use tracing::{debug, warn};

use super::errors::ResolveError;
use super::models::{
    Marker, NormalizedResult, Source, SourcesResponse, Track, TrackPolicy, UNKNOWN_TYPE,
};

/// Substring that marks an already playable manifest URL
pub const MANIFEST_MARKER: &str = ".m3u8";

/// Shape of the `sources` field
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    /// Playable manifest URL, used as-is
    Manifest(String),
    /// Array of source entries, raw or JSON-encoded
    Entries(Vec<Value>),
    /// Opaque string that needs decrypting
    Encrypted(String),
    /// Anything else (number, object, bool, null)
    Unexpected(&'static str),
}

impl SourcePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Manifest(_) => "manifest",
            Self::Entries(_) => "entries",
            Self::Encrypted(_) => "encrypted",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Classify the raw `sources` value
pub fn classify(sources: &Value) -> SourcePayload {
    match sources {
        Value::String(s) if s.contains(MANIFEST_MARKER) => SourcePayload::Manifest(s.clone()),
        Value::String(s) => match serde_json::from_str::<Vec<Value>>(s) {
            Ok(entries) => SourcePayload::Entries(entries),
            Err(_) => SourcePayload::Encrypted(s.clone()),
        },
        Value::Array(entries) => SourcePayload::Entries(entries.clone()),
        other => SourcePayload::Unexpected(value_kind(other)),
    }
}

/// Map array entries to sources; entries without a `file` are dropped
pub fn map_entries(entries: &[Value]) -> Vec<Source> {
    entries
        .iter()
        .filter_map(|entry| {
            let file = entry["file"].as_str().filter(|f| !f.is_empty())?;
            let source_type = label_of(&entry["type"])
                .or_else(|| label_of(&entry["quality"]))
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string());

            Some(Source {
                file: file.to_string(),
                source_type,
            })
        })
        .collect()
}

fn label_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Turn a decrypted plaintext into sources.
///
/// The plaintext is normally a JSON array; some generations encrypt the bare
/// manifest URL instead.
pub fn sources_from_plaintext(plaintext: &str) -> Result<Vec<Source>, ResolveError> {
    let trimmed = plaintext.trim();

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(entries)) => Ok(map_entries(&entries)),
        Ok(Value::String(url)) if url.contains(MANIFEST_MARKER) => Ok(vec![Source::manifest(url)]),
        Ok(other) => Err(ResolveError::UnexpectedPayloadShape(format!(
            "decrypted {}",
            value_kind(&other)
        ))),
        Err(_) if trimmed.contains(MANIFEST_MARKER) && !trimmed.contains(char::is_whitespace) => {
            Ok(vec![Source::manifest(trimmed)])
        }
        Err(e) => Err(ResolveError::JsonParseFailure(e.to_string())),
    }
}

/// Read a numeric field that may arrive as integer, float or string
fn lenient_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(|f| f.max(0.0) as u64).unwrap_or(0),
        _ => 0,
    }
}

/// Seconds value of a marker bound; unlike `t` it keeps its fraction
fn lenient_seconds(value: Option<&Value>) -> f64 {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}

fn marker(value: Option<&Value>) -> Option<Marker> {
    let value = value.filter(|v| v.is_object())?;
    Some(Marker {
        start: lenient_seconds(value.get("start")),
        end: lenient_seconds(value.get("end")),
    })
}

/// Parse the `tracks` array, skipping entries that are not track objects
pub fn parse_tracks(value: Option<&Value>) -> Vec<Track> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Track>(item.clone()) {
            Ok(track) => Some(track),
            Err(e) => {
                debug!(error = %e, "Skipping malformed track entry");
                None
            }
        })
        .collect()
}

/// Assemble the final result around already-resolved sources
pub fn normalize(response: &SourcesResponse, sources: Vec<Source>, policy: TrackPolicy) -> NormalizedResult {
    NormalizedResult {
        sources,
        tracks: policy.apply(parse_tracks(response.tracks.as_ref())),
        resume_time_seconds: lenient_u64(response.t.as_ref()),
        server_id: lenient_u64(response.server.as_ref()),
        intro: marker(response.intro.as_ref()),
        outro: marker(response.outro.as_ref()),
    }
}

/// Classify and normalize a response that needs no decryption.
///
/// Encrypted or unexpected payloads degrade to an empty source list; callers
/// that can decrypt go through the orchestrator instead.
pub fn normalize_unencrypted(response: &SourcesResponse, policy: TrackPolicy) -> NormalizedResult {
    let sources = match response.sources.as_ref().map(classify) {
        Some(SourcePayload::Manifest(url)) => vec![Source::manifest(url)],
        Some(SourcePayload::Entries(entries)) => map_entries(&entries),
        Some(payload) => {
            warn!(kind = payload.kind(), "Sources need decryption or have an unexpected shape");
            Vec::new()
        }
        None => Vec::new(),
    };

    normalize(response, sources, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> SourcesResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_manifest_string() {
        let url = "https://cdn.test/x/master.m3u8?token=abc";
        let payload = classify(&json!(url));
        assert_eq!(payload, SourcePayload::Manifest(url.to_string()));

        let result = normalize_unencrypted(&response(json!({"sources": url})), TrackPolicy::PassThrough);
        assert_eq!(result.sources, vec![Source::manifest(url)]);
        assert_eq!(result.sources[0].source_type, "hls");
    }

    #[test]
    fn test_array_type_quality_unknown() {
        let sources = json!([
            {"file": "a", "type": "hls"},
            {"file": "b", "quality": "720p"},
            {"file": "c"}
        ]);
        let SourcePayload::Entries(entries) = classify(&sources) else {
            panic!("expected entries");
        };
        let mapped = map_entries(&entries);

        let types: Vec<&str> = mapped.iter().map(|s| s.source_type.as_str()).collect();
        assert_eq!(types, vec!["hls", "720p", "unknown"]);
        assert_eq!(mapped[1].file, "b");
    }

    #[test]
    fn test_json_encoded_array_string() {
        let sources = json!(r#"[{"file":"https://cdn.test/v.mp4","type":"mp4"}]"#);
        let payload = classify(&sources);
        assert_eq!(payload.kind(), "entries");
    }

    #[test]
    fn test_opaque_string_is_encrypted() {
        let payload = classify(&json!("U2FsdGVkX18BAgMEBQYHCIdoM9Sq"));
        assert_eq!(payload, SourcePayload::Encrypted("U2FsdGVkX18BAgMEBQYHCIdoM9Sq".to_string()));
    }

    #[test]
    fn test_unexpected_shape() {
        assert_eq!(classify(&json!(42)), SourcePayload::Unexpected("number"));
        assert_eq!(classify(&json!({"file": "x"})), SourcePayload::Unexpected("object"));

        let result = normalize_unencrypted(&response(json!({"sources": 42})), TrackPolicy::PassThrough);
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_entries_without_file_are_dropped() {
        let mapped = map_entries(&[json!({"type": "hls"}), json!("oops"), json!({"file": "ok", "quality": 1080})]);
        assert_eq!(
            mapped,
            vec![Source {
                file: "ok".to_string(),
                source_type: "1080".to_string()
            }]
        );
    }

    #[test]
    fn test_plaintext_array_and_bare_url() {
        let sources = sources_from_plaintext(r#"[{"file":"https://cdn.test/a.m3u8","type":"hls"}]"#).unwrap();
        assert_eq!(sources, vec![Source::manifest("https://cdn.test/a.m3u8")]);

        let bare = sources_from_plaintext("https://cdn.test/b.m3u8\n").unwrap();
        assert_eq!(bare, vec![Source::manifest("https://cdn.test/b.m3u8")]);

        assert!(matches!(
            sources_from_plaintext("garbage text"),
            Err(ResolveError::JsonParseFailure(_))
        ));
    }

    #[test]
    fn test_auxiliary_fields_default_to_zero() {
        let result = normalize(&response(json!({"sources": []})), Vec::new(), TrackPolicy::PassThrough);
        assert_eq!(result, NormalizedResult::empty());
    }

    #[test]
    fn test_auxiliary_fields_pass_through() {
        let resp = response(json!({
            "sources": [],
            "tracks": [
                {"file": "en.vtt", "label": "English", "kind": "captions", "default": true},
                {"file": "thumbs.vtt", "kind": "thumbnails"},
                "not a track"
            ],
            "t": 120,
            "server": "2",
            "intro": {"start": 31, "end": 115},
            "outro": {"start": 1370.5, "end": 1460}
        }));

        let all = normalize(&resp, Vec::new(), TrackPolicy::PassThrough);
        assert_eq!(all.tracks.len(), 2);
        assert_eq!(all.tracks[0].is_default, Some(true));
        assert_eq!(all.resume_time_seconds, 120);
        assert_eq!(all.server_id, 2);
        assert_eq!(all.intro, Some(Marker { start: 31.0, end: 115.0 }));
        assert_eq!(all.outro, Some(Marker { start: 1370.5, end: 1460.0 }));
        assert_eq!(
            serde_json::to_value(all.outro).unwrap(),
            json!({"start": 1370.5, "end": 1460.0})
        );

        let captions = normalize(&resp, Vec::new(), TrackPolicy::CaptionsOnly);
        assert_eq!(captions.tracks.len(), 1);
        assert_eq!(captions.tracks[0].label.as_deref(), Some("English"));
    }
}
