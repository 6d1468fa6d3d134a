// Remote decrypt fallback
//
// v3 payloads need the page nonce on top of the registry key and are decoded
// by an external HTTP service. Its answer is free-form text containing a
// `"file":"..."` pair; anything else is a hard failure.

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::errors::ResolveError;
use super::nonce::Nonce;
use super::traits::{HttpFetcher, RequestHeaders};
use super::utils::url_with_params;

lazy_static::lazy_static! {
    static ref FILE_FIELD_RE: Regex = Regex::new(r#""file":"(.*?)""#).unwrap();
}

/// Client for the remote decoding endpoint
pub struct RemoteDecoder {
    fetcher: Arc<dyn HttpFetcher>,
    decode_url: String,
    headers: RequestHeaders,
}

impl RemoteDecoder {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, decode_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            decode_url: decode_url.into(),
            headers: RequestHeaders::new(),
        }
    }

    pub fn with_headers(mut self, headers: RequestHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Full request URL for one payload
    pub fn request_url(&self, envelope: &str, nonce: &Nonce, secret: &str) -> Result<String, ResolveError> {
        url_with_params(
            &self.decode_url,
            &[
                ("encrypted_data", envelope),
                ("nonce", nonce.as_str()),
                ("secret", secret),
            ],
        )
    }

    /// Decode `envelope` remotely and return the manifest URL
    pub async fn remote_decrypt(
        &self,
        envelope: &str,
        nonce: &Nonce,
        secret: &str,
    ) -> Result<String, ResolveError> {
        let url = self.request_url(envelope, nonce, secret)?;
        debug!(endpoint = %self.decode_url, "Requesting remote decode");

        let body = self.fetcher.get_text(&url, &self.headers).await?;

        extract_file_field(&body).ok_or_else(|| {
            warn!(response_len = body.len(), "Remote decoder answer has no file field");
            ResolveError::RemoteDecodeFailure("Video URL not found in decrypted response".to_string())
        })
    }
}

/// Pull the first `"file":"..."` value out of arbitrary response text
pub fn extract_file_field(body: &str) -> Option<String> {
    FILE_FIELD_RE
        .captures(body)
        .map(|caps| caps[1].replace("\\/", "/"))
        .filter(|file| !file.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingFetcher {
        body: String,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpFetcher for RecordingFetcher {
        async fn get_text(&self, url: &str, _headers: &RequestHeaders) -> Result<String, ResolveError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.body.clone())
        }
    }

    fn nonce() -> Nonce {
        crate::resolver::nonce::extract_nonce("AAAAbbbbCCCCddddEEEEffffGGGGhhhhIIIIjjjjKKKKllll").unwrap()
    }

    #[test]
    fn test_extract_file_field() {
        let body = r#"{"sources":[{"file":"https:\/\/cdn.test\/a\/master.m3u8","type":"hls"}]}"#;
        assert_eq!(
            extract_file_field(body).as_deref(),
            Some("https://cdn.test/a/master.m3u8")
        );
        assert_eq!(extract_file_field(r#"{"error":"bad nonce"}"#), None);
    }

    #[tokio::test]
    async fn test_remote_decrypt_sends_all_parameters() {
        let fetcher = Arc::new(RecordingFetcher {
            body: r#"<pre>{"file":"https://cdn.test/b/index.m3u8"}</pre>"#.to_string(),
            urls: Mutex::new(Vec::new()),
        });
        let decoder = RemoteDecoder::new(fetcher.clone(), "https://decoder.test/exec");

        let file = decoder.remote_decrypt("opaque+blob", &nonce(), "k1").await.unwrap();
        assert_eq!(file, "https://cdn.test/b/index.m3u8");

        let urls = fetcher.urls.lock().unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("https://decoder.test/exec?encrypted_data=opaque%2Bblob&nonce=AAAA"));
        assert!(urls[0].ends_with("&secret=k1"));
    }

    #[tokio::test]
    async fn test_missing_file_field_fails_loudly() {
        let fetcher = Arc::new(RecordingFetcher {
            body: "Error: decryption failed".to_string(),
            urls: Mutex::new(Vec::new()),
        });
        let decoder = RemoteDecoder::new(fetcher, "https://decoder.test/exec");

        assert!(matches!(
            decoder.remote_decrypt("blob", &nonce(), "k1").await,
            Err(ResolveError::RemoteDecodeFailure(_))
        ));
    }
}
