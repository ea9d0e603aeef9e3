use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::error::Error as _;
use std::fmt::Write as _;

use crate::config::{is_usable_key, Config};

/// Marker searched for when the response is not well-formed JSON.
const CONTENT_MARKER: &str = "\"content\":\"";

#[derive(Debug, Clone, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: Message,
}

/// Ways a remote query can fail. Each renders as the chat reply shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("ERROR: OpenAI API key is not configured. Set OPENAI_API_KEY in the environment or in .env")]
    NotConfigured,

    #[error("Error connecting to OpenAI: {0}")]
    Transport(String),

    #[error("OpenAI API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Could not extract an answer from the OpenAI response: {0}")]
    MissingContent(String),
}

/// Client for the OpenAI chat-completion API.
///
/// Shares the process-wide `reqwest::Client`; every call owns its request and
/// response buffers and drops them before returning.
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    temperature: f32,
    retry: bool,
}

impl OpenAIClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            api_key: config.openai_api_key.clone(),
            endpoint: config.openai_api_url.clone(),
            model: config.openai_model.clone(),
            temperature: config.openai_temperature,
            retry: config.openai_retry,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().map(is_usable_key).unwrap_or(false)
    }

    /// Asks the question and turns any failure into a readable reply.
    pub async fn ask(&self, question: &str) -> String {
        match self.get_response(question).await {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("⚠️ OpenAI query failed: {}", e);
                e.to_string()
            }
        }
    }

    pub async fn get_response(&self, question: &str) -> Result<String, RemoteError> {
        let api_key = match self.api_key.as_deref().filter(|key| is_usable_key(key)) {
            Some(key) => key,
            None => return Err(RemoteError::NotConfigured),
        };

        let body = request_body(&self.model, question, self.temperature);
        log::info!("📡 Querying {} with model {}", self.endpoint, self.model);

        let (status, text) = self.send(api_key, body).await?;

        match extract_content(&text) {
            Some(answer) => Ok(answer),
            None if !status.is_success() => Err(RemoteError::Api {
                status: status.as_u16(),
                body: text,
            }),
            None => {
                log::warn!("⚠️ No content in OpenAI response");
                Err(RemoteError::MissingContent(text))
            }
        }
    }

    /// POSTs the body, retrying once on a connect or timeout failure when enabled.
    async fn send(&self, api_key: &str, body: String) -> Result<(StatusCode, String), RemoteError> {
        let mut retried = false;
        loop {
            match self.post(api_key, body.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if self.retry && !retried && (e.is_connect() || e.is_timeout()) => {
                    log::warn!("🔁 Transient failure, retrying once: {}", describe(&e));
                    retried = true;
                }
                Err(e) => {
                    log::error!("OpenAI transport error: {}", describe(&e));
                    return Err(RemoteError::Transport(describe(&e)));
                }
            }
        }
    }

    async fn post(&self, api_key: &str, body: String) -> reqwest::Result<(StatusCode, String)> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }
}

/// Chat-completion request with a single user message.
pub fn request_body(model: &str, question: &str, temperature: f32) -> String {
    format!(
        "{{\"model\": \"{}\", \"messages\": [{{\"role\": \"user\", \"content\": \"{}\"}}], \"temperature\": {}}}",
        escape_json(model),
        escape_json(question),
        temperature
    )
}

/// Escapes `"` and `\`, and writes control characters below 0x20 as `\u00xx`.
/// Everything else passes through untouched.
pub fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Pulls the answer text out of a chat-completion response.
///
/// Parses the body as JSON first; if that fails, decodes the string that
/// follows the first `"content":"` marker.
pub fn extract_content(body: &str) -> Option<String> {
    if let Ok(response) = serde_json::from_str::<OpenAIResponse>(body) {
        if let Some(content) = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
        {
            return Some(content);
        }
    }
    scan_content_marker(body)
}

fn scan_content_marker(body: &str) -> Option<String> {
    let start = body.find(CONTENT_MARKER)? + CONTENT_MARKER.len();
    let rest = &body[start..];

    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Some(unescape(&rest[..i])),
            _ => {}
        }
    }
    None
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// reqwest errors hide the useful part (DNS, refused, TLS) in their source chain.
fn describe(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let _ = write!(message, ": {}", cause);
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{ErrorKind, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    fn test_http() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    fn client(endpoint: &str, api_key: Option<&str>) -> OpenAIClient {
        let mut config = Config::builtin();
        config.openai_api_url = endpoint.to_string();
        config.openai_api_key = api_key.map(str::to_string);
        OpenAIClient::new(test_http(), &config)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .to_lowercase()
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= head_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Serves one canned response on loopback and hands back the raw request.
    fn spawn_stub(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (url, handle)
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_json(r#"say "hi"\now"#), r#"say \"hi\"\\now"#);
    }

    #[test]
    fn escapes_control_characters_as_lowercase_unicode() {
        assert_eq!(escape_json("a\nb"), "a\\u000ab");
        assert_eq!(escape_json("\t\x1f\x00"), "\\u0009\\u001f\\u0000");
    }

    #[test]
    fn leaves_other_characters_alone() {
        assert_eq!(escape_json("¿qué tal? / ok \x7f"), "¿qué tal? / ok \x7f");
    }

    #[test]
    fn request_body_is_valid_json() {
        let body = request_body("gpt-3.5-turbo", "line one\n\"two\"", 0.7);
        assert!(body.contains("line one\\u000a\\\"two\\\""));

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "line one\n\"two\"");
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn extracts_content_from_a_regular_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Hola \"amigo\"\nadios"}, "finish_reason": "stop"}
            ]
        }"#;
        assert_eq!(extract_content(body).as_deref(), Some("Hola \"amigo\"\nadios"));
    }

    #[test]
    fn falls_back_to_the_marker_on_broken_json() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"café \\ \"ok\"\tdone"}}"#;
        assert_eq!(extract_content(body).as_deref(), Some("café \\ \"ok\"\tdone"));
    }

    #[test]
    fn missing_marker_extracts_nothing() {
        assert_eq!(extract_content(r#"{"error": {"message": "bad key"}}"#), None);
        assert_eq!(extract_content(r#"{"content":"never closed"#), None);
    }

    #[tokio::test]
    async fn unset_key_makes_no_network_call() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

        for key in [None, Some(""), Some("not-configured")] {
            let client = client(&url, key);
            assert!(!client.is_configured());
            let err = client.get_response("hola").await.unwrap_err();
            assert!(matches!(err, RemoteError::NotConfigured));
        }

        let accepted = listener.accept();
        assert!(matches!(accepted, Err(ref e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[tokio::test]
    async fn sends_authenticated_request_and_returns_answer() {
        let (url, server) = spawn_stub(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"Madrid"}}]}"#,
        );
        let client = client(&url, Some("sk-test"));

        let answer = client.ask("capital of \"Spain\"?").await;
        assert_eq!(answer, "Madrid");

        let request = server.join().unwrap();
        let lowered = request.to_lowercase();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(lowered.contains("authorization: bearer sk-test"));
        assert!(lowered.contains("content-type: application/json"));
        assert!(request.contains(r#""content": "capital of \"Spain\"?""#));
        assert!(request.contains(r#""model": "gpt-3.5-turbo""#));
    }

    #[tokio::test]
    async fn error_status_without_content_is_an_api_error() {
        let (url, server) = spawn_stub(
            "401 Unauthorized",
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        );
        let client = client(&url, Some("sk-wrong"));

        let err = client.get_response("hola").await.unwrap_err();
        server.join().unwrap();
        match err {
            RemoteError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Incorrect API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_without_content_is_reported() {
        let (url, server) = spawn_stub("200 OK", r#"{"choices":[]}"#);
        let client = client(&url, Some("sk-test"));

        let reply = client.ask("hola").await;
        server.join().unwrap();
        assert!(reply.starts_with("Could not extract an answer"));
        assert!(reply.contains(r#"{"choices":[]}"#));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = client(&format!("http://127.0.0.1:{}/v1/chat/completions", port), Some("sk-test"));

        let err = client.get_response("hola").await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
        assert!(err.to_string().starts_with("Error connecting to OpenAI: "));
    }

    /// Runs one query against a listener that accepts but never answers and
    /// returns how many connections it received.
    async fn connections_until_timeout(retry: bool) -> usize {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = Config::builtin();
        config.openai_api_url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        config.openai_api_key = Some("sk-test".to_string());
        config.openai_timeout_secs = 1;
        config.openai_retry = retry;

        let http = crate::ai::http_client_builder(&config).no_proxy().build().unwrap();
        let client = OpenAIClient::new(http, &config);

        let started = std::time::Instant::now();
        let err = client.get_response("hola").await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)), "unexpected error: {err:?}");
        assert!(started.elapsed() >= Duration::from_secs(1));

        // The kernel queues completed handshakes even though nobody called accept
        listener.set_nonblocking(true).unwrap();
        let mut connections = 0;
        while listener.accept().is_ok() {
            connections += 1;
        }
        connections
    }

    #[tokio::test]
    async fn timeout_is_retried_exactly_once() {
        assert_eq!(connections_until_timeout(true).await, 2);
    }

    #[tokio::test]
    async fn timeout_without_retry_makes_one_attempt() {
        assert_eq!(connections_until_timeout(false).await, 1);
    }

    #[test]
    fn shared_client_builds_from_config() {
        let mut config = Config::builtin();
        config.openai_timeout_secs = 3;
        assert!(crate::ai::build_http_client(&config).is_ok());
    }
}
