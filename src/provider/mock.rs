//! Mock provider for testing
//!
//! Returns configurable responses without making real API calls, streaming
//! them word by word so chunk handling is exercised. Records every request
//! for assertions.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Provider, StreamChunk, StreamRequest};

/// Mock provider that returns predefined responses
pub struct MockProvider {
    /// Queue of responses to return (FIFO)
    responses: Arc<Mutex<Vec<String>>>,
    /// Default response when queue is empty
    default_response: String,
    /// Track all requests made (for assertions)
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![])),
            default_response: "Mock response".to_string(),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create with a queue of responses
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            default_response: "Mock response".to_string(),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Set the default response when the queue is empty
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Add a response to the queue
    pub fn queue_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push(response.into());
    }

    /// Get all requests made to this provider
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<StreamRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-v1"
    }

    async fn stream(
        &self,
        request: StreamRequest,
        chunks: mpsc::Sender<StreamChunk>,
    ) -> Result<String> {
        self.requests.lock().unwrap().push(request);

        let response = {
            let mut queue = self.responses.lock().unwrap();
            if queue.is_empty() {
                self.default_response.clone()
            } else {
                queue.remove(0)
            }
        };

        // Stream word by word so consumers see multiple deltas
        let words: Vec<&str> = response.split_inclusive(' ').collect();
        for word in words {
            let _ = chunks.send(StreamChunk::Delta(word.to_string())).await;
        }
        let _ = chunks.send(StreamChunk::Done).await;

        Ok(response)
    }
}
