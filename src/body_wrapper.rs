//! Non-destructive body buffering.
//!
//! The logger needs the full bytes of a body to render it, but whatever consumes the message
//! afterwards must still be able to read the body as if nobody had looked at it. This module reads
//! a body to the end and hands back a replacement body that replays exactly what was read.

use axum::body::{Body, Bytes};
use futures::stream;
use http_body_util::BodyExt;
use tracing::debug;

/// Error type for body capture operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum BodyCaptureError {
    #[error("Body stream error: {0}")]
    Stream(String),
}

/// A body that has been read to the end (or to its first failure).
#[derive(Debug)]
pub struct BufferedBody {
    /// Concatenated data frames read from the original body.
    pub bytes: Bytes,
    /// The failure that stopped the read early, if any.
    pub error: Option<BodyCaptureError>,
    /// Drop-in replacement for the original body.
    pub body: Body,
}

/// Reads `body` to the end and returns its bytes together with a fresh body yielding the same
/// data.
///
/// If the original body fails part way through, the replacement replays the chunks that were
/// read and then yields the same failure, so downstream readers see what they would have seen
/// without the logger in between. Trailers are not preserved.
///
/// # Examples
///
/// ```rust
/// use axum::body::Body;
/// use http_body_util::BodyExt;
/// use wiretap::body_wrapper::buffer_body;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let buffered = buffer_body(Body::from("Hello, World!")).await;
/// assert_eq!(buffered.bytes, "Hello, World!");
///
/// // The replacement body is still fully readable
/// let replayed = buffered.body.collect().await?.to_bytes();
/// assert_eq!(replayed, "Hello, World!");
/// # Ok(())
/// # }
/// ```
pub async fn buffer_body(mut body: Body) -> BufferedBody {
    let mut chunks: Vec<Bytes> = Vec::new();

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    chunks.push(data);
                }
            }
            Err(e) => {
                debug!(error = %e, chunks = chunks.len(), "Body stream failed while buffering");
                let error = BodyCaptureError::Stream(e.to_string());
                let bytes = concat(&chunks);
                let replay = chunks
                    .into_iter()
                    .map(Ok::<_, axum::Error>)
                    .chain(std::iter::once(Err(e)));
                return BufferedBody {
                    bytes,
                    error: Some(error),
                    body: Body::from_stream(stream::iter(replay)),
                };
            }
        }
    }

    let bytes = concat(&chunks);
    BufferedBody {
        bytes: bytes.clone(),
        error: None,
        body: Body::from(bytes),
    }
}

fn concat(chunks: &[Bytes]) -> Bytes {
    match chunks {
        [] => Bytes::new(),
        [single] => single.clone(),
        _ => chunks.concat().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::buffer_body;
    use axum::body::{Body, Bytes};
    use futures::stream;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_buffered_body_is_replayed() {
        let buffered = buffer_body(Body::from("Hello, World!")).await;

        assert_eq!(buffered.bytes, "Hello, World!");
        assert!(buffered.error.is_none());

        let replayed = buffered.body.collect().await.unwrap().to_bytes();
        assert_eq!(replayed, "Hello, World!");
    }

    #[tokio::test]
    async fn test_streaming_chunks_are_concatenated() {
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from("chunk1")),
            Ok(Bytes::from("chunk2")),
            Ok(Bytes::from("chunk3")),
        ];
        let buffered = buffer_body(Body::from_stream(stream::iter(chunks))).await;

        assert_eq!(buffered.bytes, "chunk1chunk2chunk3");
        let replayed = buffered.body.collect().await.unwrap().to_bytes();
        assert_eq!(replayed, "chunk1chunk2chunk3");
    }

    #[tokio::test]
    async fn test_empty_body() {
        let buffered = buffer_body(Body::empty()).await;

        assert!(buffered.bytes.is_empty());
        assert!(buffered.error.is_none());
        let replayed = buffered.body.collect().await.unwrap().to_bytes();
        assert!(replayed.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_replayed_after_partial_data() {
        let chunks = vec![
            Ok(Bytes::from("partial")),
            Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream closed",
            )),
        ];
        let buffered = buffer_body(Body::from_stream(stream::iter(chunks))).await;

        assert_eq!(buffered.bytes, "partial");
        let error = buffered.error.expect("read should have failed");
        assert!(error.to_string().contains("stream closed"));

        let mut body = buffered.body;
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(first, "partial");
        let second = body.frame().await.unwrap();
        assert!(second.is_err());
    }
}
