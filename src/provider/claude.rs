//! Claude provider using the Anthropic Messages API (SSE streaming)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{Provider, StreamChunk, StreamRequest, CLAUDE_DEFAULT_MODEL};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const INFER_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct ClaudeProvider {
    api_key: String,
    client: Client,
}

impl ClaudeProvider {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY not set")?;

        let client = Client::builder()
            .timeout(INFER_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent("folio/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { api_key, client })
    }

    fn request_body(&self, request: &StreamRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": true,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if !request.stop.is_empty() {
            body["stop_sequences"] = json!(request.stop);
        }
        body
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        CLAUDE_DEFAULT_MODEL
    }

    async fn stream(
        &self,
        request: StreamRequest,
        chunks: mpsc::Sender<StreamChunk>,
    ) -> Result<String> {
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&self.request_body(&request))
            .send()
            .await
            .context("Failed to send request to Claude API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {}: {}", status, body);
        }

        let mut full_text = String::new();
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(bytes) = stream.next().await {
            let bytes = bytes.context("Claude stream read failed")?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            // SSE frames are newline-delimited; process complete lines only
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim_end().to_string();
                buffer.drain(..=newline);

                let Some(data) = line.strip_prefix("data: ") else { continue };
                let Ok(event) = serde_json::from_str::<Value>(data) else { continue };

                match event["type"].as_str() {
                    Some("content_block_delta") => {
                        if let Some(delta) = event["delta"]["text"].as_str() {
                            full_text.push_str(delta);
                            let _ = chunks.send(StreamChunk::Delta(delta.to_string())).await;
                        }
                    }
                    Some("error") => {
                        anyhow::bail!(
                            "Claude stream error: {}",
                            event["error"]["message"].as_str().unwrap_or("unknown")
                        );
                    }
                    _ => {}
                }
            }
        }

        let _ = chunks.send(StreamChunk::Done).await;
        Ok(full_text)
    }
}
