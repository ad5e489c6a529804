use std::{collections::VecDeque, pin::Pin, time::Duration};

use anyhow::{Error, Result, bail};
use futures_util::{Stream, StreamExt};
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::session::{ChatTurn, Role};
use crate::sse::SseDecoder;

pub const DEFAULT_BASE_API: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest silence tolerated between two reads of a streamed reply.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

const DONE: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Body of a streaming chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature,
            stream: true,
        }
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: Role::System,
            content: content.into(),
        });
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: Role::User,
            content: content.into(),
        });
        self
    }

    pub fn turns(mut self, turns: &[ChatTurn]) -> Self {
        self.messages.extend(turns.iter().map(|t| Message {
            role: t.role,
            content: t.text.clone(),
        }));
        self
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_api: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(base_api: String, api_key: &str, model: String, temperature: f32) -> Result<Self> {
        Self::with_read_timeout(base_api, api_key, model, temperature, READ_TIMEOUT)
    }

    pub fn with_read_timeout(
        base_api: String,
        api_key: &str,
        model: String,
        temperature: f32,
        read_timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .build()?;

        Ok(Self {
            client,
            base_api,
            model,
            temperature,
        })
    }

    /// Empty request carrying this client's model and temperature.
    pub fn request(&self) -> ChatRequest {
        ChatRequest::new(self.model.clone(), self.temperature)
    }

    /// Starts a streaming completion. Errors before the first byte (auth,
    /// rate limit, bad request) surface here; later ones from the stream.
    #[instrument(
        name = "stream_chat",
        skip_all,
        fields(model = %request.model, messages = request.messages.len())
    )]
    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<ReplyStream, Error> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_api.trim_end_matches('/')
        );

        let res = self.client.post(url).json(request).send().await?;
        let status = res.status();

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            bail!("chat API error ({status}): {message}");
        }

        info!(%status, "chat stream opened");
        let body = res
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(Error::from));

        Ok(ReplyStream::new(body))
    }
}

/// Text fragments of one streamed reply, in arrival order.
///
/// The sequence is finite and cannot be restarted: once it yields `None` or
/// an error, every later call yields `None`.
pub struct ReplyStream {
    inner: Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl ReplyStream {
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<Vec<u8>>> + Send + 'static,
    {
        Self {
            inner: Box::pin(inner),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Some(Ok(fragment));
            }
            if self.finished {
                return None;
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    for data in self.decoder.push(&chunk) {
                        if let Err(e) = self.handle_event(&data) {
                            return Some(Err(self.fail(e)));
                        }
                    }
                }
                Some(Err(e)) => return Some(Err(self.fail(e))),
                None => {
                    if let Some(data) = self.decoder.finish()
                        && let Err(e) = self.handle_event(&data)
                    {
                        return Some(Err(self.fail(e)));
                    }
                    debug!("chat stream closed");
                    self.finished = true;
                }
            }
        }
    }

    fn fail(&mut self, e: Error) -> Error {
        self.finished = true;
        self.pending.clear();
        e
    }

    fn handle_event(&mut self, data: &str) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if data == DONE {
            debug!("chat stream done");
            self.finished = true;
            return Ok(());
        }

        let event: ChunkEvent = serde_json::from_str(data)?;
        if let Some(err) = event.error {
            bail!("chat API error: {}", err.message);
        }

        let content = event
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|s| !s.is_empty());
        if let Some(text) = content {
            self.pending.push_back(text);
        }
        Ok(())
    }
}

//
// Match chat-completions JSON
// https://platform.openai.com/docs/api-reference/chat/streaming
//
#[derive(Debug, Deserialize)]
struct ChunkEvent {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use futures_util::stream;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    fn reply(chunks: Vec<Result<Vec<u8>>>) -> ReplyStream {
        ReplyStream::new(stream::iter(chunks))
    }

    async fn collect(stream: &mut ReplyStream) -> Vec<Result<String>> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn yields_fragments_in_order_until_done() {
        let body = format!(
            "data: {}\n\n{}{}data: [DONE]\n\n{}",
            serde_json::json!({"choices": [{"delta": {"role": "assistant"}}]}),
            chunk("삼성전자는 "),
            chunk("보합입니다."),
            chunk("after done"),
        );
        let mut stream = reply(vec![Ok(body.into_bytes())]);

        let fragments: Vec<String> = collect(&mut stream)
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(fragments, vec!["삼성전자는 ", "보합입니다."]);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn events_split_across_chunks() {
        let body = format!("{}{}", chunk("안녕"), chunk("하세요"));
        let bytes = body.into_bytes();
        let chunks = bytes.chunks(5).map(|c| Ok(c.to_vec())).collect();
        let mut stream = reply(chunks);

        let text: String = collect(&mut stream)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(text, "안녕하세요");
    }

    #[tokio::test]
    async fn ends_without_done_marker() {
        let mut stream = reply(vec![Ok(chunk("partial").into_bytes())]);
        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let mut stream = reply(vec![
            Ok(chunk("first").into_bytes()),
            Err(anyhow!("connection reset")),
            Ok(chunk("never").into_bytes()),
        ]);

        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn api_error_event_is_an_error() {
        let body = format!(
            "data: {}\n\n",
            serde_json::json!({"error": {"message": "Rate limit reached", "type": "requests"}})
        );
        let mut stream = reply(vec![Ok(body.into_bytes())]);

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("Rate limit reached"));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn request_serializes_history() {
        let turns = vec![ChatTurn::user("삼성전자 어때"), ChatTurn::assistant("좋아요")];
        let request = ChatRequest::new(DEFAULT_MODEL, DEFAULT_TEMPERATURE)
            .system("prompt")
            .turns(&turns)
            .user("지금 사도 돼?");

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "삼성전자 어때");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["messages"][3]["role"], "user");
        assert_eq!(json["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn stalled_stream_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
                )
                .await
                .unwrap();
            // headers only, then silence
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let client = ChatClient::with_read_timeout(
            format!("http://{addr}"),
            "test-key",
            DEFAULT_MODEL.to_string(),
            DEFAULT_TEMPERATURE,
            Duration::from_millis(200),
        )
        .unwrap();
        let request = client.request().user("hi");

        let mut stream = client.stream_chat(&request).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("read timeout did not fire");

        assert!(outcome.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
