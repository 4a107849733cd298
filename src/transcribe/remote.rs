//! Remote speech-to-text dispatch over HTTP
//!
//! Sends the raw capture to a relay that wraps the same engine, enabling a
//! GPU box elsewhere on the network to do the heavy lifting. The request is
//! a multipart form with exactly two parts:
//!
//! - `audio_data`: raw little-endian PCM16 mono 16 kHz bytes
//! - `language`: UTF-8 language code
//!
//! A successful response is JSON `{"transcription": "...", "server_time": 1.2}`.
//! An empty or unparseable body is a failed dispatch, never an empty
//! transcript.

use super::{Dispatch, TranscriptionResult};
use crate::audio::AudioBuffer;
use crate::error::TranscribeError;
use serde::Deserialize;

/// Remote dispatcher POSTing captures to a configured endpoint
#[derive(Debug)]
pub struct RemoteDispatcher {
    /// Full endpoint URL (e.g. "http://192.168.1.20:5000/transcribe")
    endpoint: String,
}

/// Shape of the relay's success response
#[derive(Debug, Deserialize)]
struct RelayResponse {
    transcription: String,
    server_time: f32,
}

impl RemoteDispatcher {
    pub fn new(endpoint: String) -> Self {
        if endpoint.starts_with("http://")
            && !endpoint.contains("localhost")
            && !endpoint.contains("127.0.0.1")
            && !endpoint.contains("[::1]")
        {
            tracing::warn!(
                "Remote endpoint uses HTTP without TLS. Audio data will be transmitted unencrypted!"
            );
        }

        Self { endpoint }
    }

    /// Build the multipart form body carrying the audio bytes and language
    fn build_multipart_body(&self, audio: &[u8], language: &str) -> (String, Vec<u8>) {
        let boundary = format!(
            "----ClipspeakBoundary{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        let mut body = Vec::new();

        // Raw PCM part
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"audio_data\"; filename=\"audio.pcm\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(audio);
        body.extend_from_slice(b"\r\n");

        // Language part
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"language\"\r\n\r\n");
        body.extend_from_slice(language.as_bytes());
        body.extend_from_slice(b"\r\n");

        // End boundary
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        (boundary, body)
    }
}

impl Dispatch for RemoteDispatcher {
    fn dispatch(
        &self,
        audio: &AudioBuffer,
        language: &str,
    ) -> Result<TranscriptionResult, TranscribeError> {
        if audio.is_empty() {
            return Err(TranscribeError::AudioFormat("empty audio buffer".into()));
        }

        tracing::debug!(
            "Sending {:.2}s of audio ({} bytes) to {}",
            audio.duration_secs(),
            audio.as_bytes().len(),
            self.endpoint
        );

        let start = std::time::Instant::now();
        let (boundary, body) = self.build_multipart_body(audio.as_bytes(), language);

        let response = ureq::post(&self.endpoint)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let detail = resp.into_string().unwrap_or_default();
                    TranscribeError::Remote(format!("server returned {code}: {detail}"))
                }
                ureq::Error::Transport(t) => {
                    TranscribeError::Network(format!("request failed: {t}"))
                }
            })?;

        let raw = response
            .into_string()
            .map_err(|e| TranscribeError::Network(format!("failed to read response: {e}")))?;

        if raw.trim().is_empty() {
            return Err(TranscribeError::Remote("empty response body".into()));
        }

        let parsed: RelayResponse = serde_json::from_str(&raw)
            .map_err(|e| TranscribeError::Remote(format!("malformed response: {e}")))?;

        tracing::debug!(
            "Remote transcription completed in {:.2}s (server {:.2}s)",
            start.elapsed().as_secs_f32(),
            parsed.server_time
        );

        Ok(TranscriptionResult {
            text: parsed.transcription.trim().to_string(),
            server_time: parsed.server_time,
            total_time: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    /// Serve exactly one request on a loopback port, replying with `body`
    fn one_shot_server(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            // Read headers, find the content length
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                let line = line.trim();
                if line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }

            // Drain the request body before answering
            let mut request_body = vec![0u8; content_length];
            let _ = reader.read_exact(&mut request_body);

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        });

        format!("http://{addr}/transcribe")
    }

    fn short_buffer() -> AudioBuffer {
        AudioBuffer::from_samples(&vec![500i16; 1600])
    }

    #[test]
    fn test_multipart_body_structure() {
        let dispatcher = RemoteDispatcher::new("http://localhost:5000/transcribe".to_string());
        let audio = [1u8, 2, 3, 4];
        let (boundary, body) = dispatcher.build_multipart_body(&audio, "ru");

        let body_str = String::from_utf8_lossy(&body);
        assert!(body_str.contains(&boundary));
        assert!(body_str.contains("name=\"audio_data\""));
        assert!(body_str.contains("name=\"language\""));
        assert!(body_str.contains("ru"));
        assert!(body_str.ends_with(&format!("--{boundary}--\r\n")));

        // The raw audio bytes are embedded untouched
        assert!(body
            .windows(audio.len())
            .any(|window| window == audio.as_slice()));
    }

    #[test]
    fn test_successful_dispatch() {
        let url = one_shot_server(r#"{"transcription": "hello world", "server_time": 0.42}"#);
        let dispatcher = RemoteDispatcher::new(url);

        let result = dispatcher.dispatch(&short_buffer(), "en").unwrap();
        assert_eq!(result.text, "hello world");
        assert!((result.server_time - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_empty_body_is_an_error() {
        let url = one_shot_server("");
        let dispatcher = RemoteDispatcher::new(url);

        let err = dispatcher.dispatch(&short_buffer(), "en");
        assert!(matches!(err, Err(TranscribeError::Remote(_))));
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        let url = one_shot_server("transcribed text, but not JSON");
        let dispatcher = RemoteDispatcher::new(url);

        let err = dispatcher.dispatch(&short_buffer(), "en");
        assert!(matches!(err, Err(TranscribeError::Remote(_))));
    }

    #[test]
    fn test_connection_refused_is_a_network_error() {
        // Nothing listens on this port
        let dispatcher = RemoteDispatcher::new("http://127.0.0.1:1/transcribe".to_string());
        let err = dispatcher.dispatch(&short_buffer(), "en");
        assert!(matches!(err, Err(TranscribeError::Network(_))));
    }

    #[test]
    fn test_empty_buffer_short_circuits() {
        let dispatcher = RemoteDispatcher::new("http://127.0.0.1:1/transcribe".to_string());
        let err = dispatcher.dispatch(&AudioBuffer::default(), "en");
        assert!(matches!(err, Err(TranscribeError::AudioFormat(_))));
    }
}
