//! Remote clients against a scripted local HTTP server.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use docent::embedding::OpenAIEmbedder;
use docent::http::ApiClient;
use docent::llm::{ChatCompletion, ChatMessage, ChatRequest, OpenAIChat};
use docent::presets::{Voice, VoiceModel};
use docent::tts::{OpenAISpeech, SpeechRequest, SpeechSynthesizer};
use docent::RagError;
use docent_core::embedding::Embedder;

struct Canned {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

fn json(status: u16, value: serde_json::Value) -> Canned {
    Canned {
        status,
        content_type: "application/json",
        body: value.to_string().into_bytes(),
    }
}

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl Recorded {
    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn head(&self, i: usize) -> String {
        self.requests.lock().unwrap()[i].0.clone()
    }

    fn body(&self, i: usize) -> serde_json::Value {
        serde_json::from_str(&self.requests.lock().unwrap()[i].1).unwrap()
    }
}

/// Serve `responses` in order, one per connection.
async fn serve(responses: Vec<Canned>) -> (String, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Recorded::default();
    let log = recorded.clone();

    tokio::spawn(async move {
        for canned in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (head, body) = read_request(&mut socket).await;
            log.requests.lock().unwrap().push((head, body));

            let header = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                canned.status,
                canned.content_type,
                canned.body.len()
            );
            socket.write_all(header.as_bytes()).await.unwrap();
            socket.write_all(&canned.body).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{}/v1", addr), recorded)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    (head, body)
}

fn client(base_url: &str, max_retries: u32) -> ApiClient {
    ApiClient::new(base_url, "test-key".to_string(), max_retries, Duration::from_secs(5))
        .unwrap()
        .with_backoff_base(Duration::from_millis(1))
}

fn chat_request() -> ChatRequest {
    ChatRequest {
        model: "gpt-4.1-nano".to_string(),
        temperature: 0.7,
        messages: vec![ChatMessage::user("hi")],
    }
}

fn reply(text: &str) -> Canned {
    json(
        200,
        serde_json::json!({"choices": [{"message": {"role": "assistant", "content": text}}]}),
    )
}

#[tokio::test]
async fn test_chat_retries_server_error() {
    let (url, recorded) = serve(vec![
        json(500, serde_json::json!({"error": "boom"})),
        reply("hello there"),
    ])
    .await;

    let chat = OpenAIChat::new(client(&url, 3));
    let text = chat.complete(&chat_request()).await.unwrap();

    assert_eq!(text, "hello there");
    assert_eq!(recorded.count(), 2);
    let head = recorded.head(0);
    assert!(head.starts_with("POST /v1/chat/completions"));
    assert!(head.to_lowercase().contains("authorization: bearer test-key"));
    assert_eq!(recorded.body(0)["messages"][0]["content"], "hi");
}

#[tokio::test]
async fn test_chat_bad_request_fails_fast() {
    let (url, recorded) = serve(vec![
        json(400, serde_json::json!({"error": {"message": "bad"}})),
        reply("never sent"),
    ])
    .await;

    let chat = OpenAIChat::new(client(&url, 3));
    let err = chat.complete(&chat_request()).await.unwrap_err();

    assert!(err.is_bad_request());
    assert!(matches!(
        err,
        RagError::Generation {
            status: Some(400),
            ..
        }
    ));
    assert_eq!(recorded.count(), 1);
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let (url, recorded) = serve(vec![
        json(429, serde_json::json!({})),
        json(429, serde_json::json!({})),
        json(429, serde_json::json!({})),
    ])
    .await;

    let chat = OpenAIChat::new(client(&url, 2));
    let err = chat.complete(&chat_request()).await.unwrap_err();

    assert!(matches!(
        err,
        RagError::Generation {
            status: Some(429),
            ..
        }
    ));
    assert_eq!(recorded.count(), 3);
}

#[tokio::test]
async fn test_embeddings_request_and_order() {
    let (url, recorded) = serve(vec![json(
        200,
        serde_json::json!({"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]},
        ]}),
    )])
    .await;

    let embedder = OpenAIEmbedder::new(client(&url, 0), "text-embedding-3-small", 2);
    let vectors = embedder
        .embed(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert!(recorded.head(0).starts_with("POST /v1/embeddings"));
    let body = recorded.body(0);
    assert_eq!(body["model"], "text-embedding-3-small");
    assert_eq!(body["input"][1], "second");
}

#[tokio::test]
async fn test_embedding_failure_is_embedding_error() {
    let (url, _recorded) = serve(vec![json(401, serde_json::json!({"error": "no key"}))]).await;

    let embedder = OpenAIEmbedder::new(client(&url, 0), "text-embedding-3-small", 2);
    let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding(_)));
}

#[tokio::test]
async fn test_speech_streams_audio_to_file() {
    let audio = b"ID3\x04fake-mp3-bytes".to_vec();
    let (url, recorded) = serve(vec![Canned {
        status: 200,
        content_type: "audio/mpeg",
        body: audio.clone(),
    }])
    .await;

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("out.mp3");
    let speech = OpenAISpeech::new(client(&url, 0));
    let request = SpeechRequest::new("Hello", VoiceModel::Tts1, Voice::Alloy, "a cocky voice");
    speech.synthesize(&request, &dest).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), audio);
    assert!(recorded.head(0).starts_with("POST /v1/audio/speech"));
    let body = recorded.body(0);
    assert_eq!(body["voice"], "alloy");
    assert_eq!(body["model"], "tts-1");
    assert_eq!(body["input"], "Hello");
    assert_eq!(body["instructions"], "a cocky voice");
    assert_eq!(body["response_format"], "mp3");
}

#[tokio::test]
async fn test_speech_service_error_is_synthesis_error() {
    let (url, _recorded) = serve(vec![json(400, serde_json::json!({"error": "voice"}))]).await;

    let tmp = TempDir::new().unwrap();
    let speech = OpenAISpeech::new(client(&url, 0));
    let request = SpeechRequest::new("Hello", VoiceModel::Tts1, Voice::Alloy, "");
    let err = speech
        .synthesize(&request, &tmp.path().join("out.mp3"))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Synthesis(_)));
    assert!(!tmp.path().join("out.mp3").exists());
}
