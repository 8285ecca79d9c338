//! Crate-level error type.
//!
//! Every fallible operation in the device adapters returns [`AmbiError`].
//! The switch controller never lets these escape to its caller: it logs
//! them and falls back to a safe default (offline, dimmed, or no-op).

use std::time::Duration;

/// Errors raised while talking to the TV or the bulb, or while loading
/// configuration.
#[derive(Debug, thiserror::Error)]
pub enum AmbiError {
    /// The remote device replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// A TCP-level connection could not be established.
    #[error("connection failed to {target}: {detail}")]
    Connect { target: String, detail: String },

    /// A response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error on '{field}': {detail}")]
    Json { field: String, detail: String },

    /// The bulb answered a command with an error object.
    #[error("bulb rejected '{method}' (code {code}): {message}")]
    Bulb {
        method: String,
        code: i64,
        message: String,
    },

    /// A device call did not complete within its deadline.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// The TV's `WWW-Authenticate` header could not be used.
    #[error("digest authentication failed: {0}")]
    Auth(String),

    /// The bulb never connected back to our music-mode listener.
    #[error("music mode handshake with {0} failed")]
    MusicHandshake(String),

    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AmbiError>;

/// Run `fut` under a deadline, mapping expiry to [`AmbiError::Timeout`].
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(AmbiError::Timeout {
            operation,
            elapsed: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_display_contains_status_and_url() {
        let err = AmbiError::Http {
            status: 401,
            url: "https://10.0.0.2:1926/6/ambilight/measured".into(),
        };
        let s = err.to_string();
        assert!(s.contains("401"), "status in display: {s}");
        assert!(s.contains("ambilight/measured"), "url in display: {s}");
    }

    #[test]
    fn bulb_display_contains_method_and_code() {
        let err = AmbiError::Bulb {
            method: "start_cf".into(),
            code: -1,
            message: "unsupported method".into(),
        };
        let s = err.to_string();
        assert!(s.contains("start_cf"));
        assert!(s.contains("-1"));
        assert!(s.contains("unsupported method"));
    }

    #[test]
    fn io_error_converts_with_question_mark() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, AmbiError::Io(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_maps_expiry() {
        let res: Result<()> = with_timeout("get_prop", Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        match res {
            Err(AmbiError::Timeout { operation, elapsed }) => {
                assert_eq!(operation, "get_prop");
                assert_eq!(elapsed, Duration::from_millis(100));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn with_timeout_passes_through_result() {
        let res = with_timeout("update", Duration::from_secs(1), async { Ok(7u8) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
