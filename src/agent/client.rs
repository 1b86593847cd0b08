use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::state::AgentConfig;

/// A remote conversation thread
#[derive(Debug, Deserialize)]
pub struct ThreadObject {
    /// Opaque identifier issued by the agent service
    pub id: String,
}

/// Lifecycle states of a run, as reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to be scheduled
    Queued,
    /// Currently executing
    InProgress,
    /// Blocked on local tool outputs
    RequiresAction,
    /// Cancellation requested
    Cancelling,
    /// Cancelled before completion
    Cancelled,
    /// Ended with an error
    Failed,
    /// Finished normally
    Completed,
    /// Timed out server-side
    Expired,
    /// Any status this client does not know about
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// True while the run still occupies its thread
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Queued | Self::InProgress | Self::RequiresAction | Self::Cancelling
        )
    }

    /// True once the run can never change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Expired)
    }
}

/// Error details attached to a failed run
#[derive(Debug, Deserialize)]
pub struct RunError {
    /// Machine-readable error code
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
}

/// A single invocation of the assistant against a thread
#[derive(Debug, Deserialize)]
pub struct RunObject {
    /// Run identifier
    pub id: String,
    /// Current lifecycle state
    pub status: RunStatus,
    /// Tool calls the run is blocked on, when status is `requires_action`
    pub required_action: Option<RequiredAction>,
    /// Error details, when status is `failed`
    pub last_error: Option<RunError>,
}

/// The action a blocked run is waiting for
#[derive(Debug, Deserialize)]
pub struct RequiredAction {
    /// Tool outputs the service expects back
    pub submit_tool_outputs: SubmitToolOutputs,
}

/// Pending tool calls of a blocked run
#[derive(Debug, Deserialize)]
pub struct SubmitToolOutputs {
    /// Calls to dispatch locally
    pub tool_calls: Vec<ToolCall>,
}

/// One tool invocation requested by the agent
#[derive(Debug, Deserialize, Clone)]
pub struct ToolCall {
    /// Call identifier, echoed back with the output
    pub id: String,
    /// Function name and serialized arguments
    pub function: FunctionCall,
}

/// Function name plus its JSON-encoded arguments
#[derive(Debug, Deserialize, Clone)]
pub struct FunctionCall {
    /// Local function to dispatch
    pub name: String,
    /// Arguments as a JSON string
    pub arguments: String,
}

/// Result of one locally dispatched tool call
#[derive(Debug, Serialize, Clone)]
pub struct ToolOutput {
    /// Identifier of the call this answers
    pub tool_call_id: String,
    /// Serialized function result
    pub output: String,
}

/// A message stored on a thread
#[derive(Debug, Deserialize)]
pub struct MessageObject {
    /// Message identifier
    pub id: String,
    /// Author role (`user` or `assistant`)
    pub role: String,
    /// Ordered content parts
    pub content: Vec<MessageContent>,
}

/// One content part of a message; only text parts carry a payload here
#[derive(Debug, Deserialize)]
pub struct MessageContent {
    /// Text payload, present for text parts
    #[serde(default)]
    pub text: Option<MessageText>,
}

/// Text payload of a content part
#[derive(Debug, Deserialize)]
pub struct MessageText {
    /// The text itself
    pub value: String,
}

impl MessageObject {
    /// First text part of the message, if any
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find_map(|part| part.text.as_ref())
            .map(|t| t.value.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// Thin typed client for the hosted agent's thread/run/message lifecycle
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    /// Agent endpoint and polling settings
    pub config: AgentConfig,
}

impl AgentClient {
    /// Create a client for the configured agent endpoint
    pub fn new(config: AgentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = self.authorize(req).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(AppError::RateLimit {
                    message,
                    retry_after: None,
                });
            }
            return Err(AppError::Agent {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Create a thread, binding the configured vector store for file search
    pub async fn create_thread(&self) -> Result<ThreadObject> {
        let body = match &self.config.vector_store_id {
            Some(store) => json!({
                "tool_resources": { "file_search": { "vector_store_ids": [store] } }
            }),
            None => json!({}),
        };

        self.send(self.http.post(self.url("/threads")).json(&body))
            .await
    }

    /// Append a user message to a thread
    pub async fn add_message(&self, thread_id: &str, content: &str) -> Result<MessageObject> {
        let body = json!({ "role": "user", "content": content });
        self.send(
            self.http
                .post(self.url(&format!("/threads/{}/messages", thread_id)))
                .json(&body),
        )
        .await
    }

    /// Messages on a thread, newest first
    pub async fn list_messages(&self, thread_id: &str) -> Result<Vec<MessageObject>> {
        let list: ListResponse<MessageObject> = self
            .send(
                self.http
                    .get(self.url(&format!("/threads/{}/messages", thread_id))),
            )
            .await?;
        Ok(list.data)
    }

    /// Start a run of the configured assistant against a thread
    pub async fn create_run(&self, thread_id: &str) -> Result<RunObject> {
        let body = json!({ "assistant_id": self.config.assistant_id });
        self.send(
            self.http
                .post(self.url(&format!("/threads/{}/runs", thread_id)))
                .json(&body),
        )
        .await
    }

    /// Fetch the current state of a run
    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject> {
        self.send(
            self.http
                .get(self.url(&format!("/threads/{}/runs/{}", thread_id, run_id))),
        )
        .await
    }

    /// Recent runs on a thread
    pub async fn list_runs(&self, thread_id: &str) -> Result<Vec<RunObject>> {
        let list: ListResponse<RunObject> = self
            .send(
                self.http
                    .get(self.url(&format!("/threads/{}/runs", thread_id))),
            )
            .await?;
        Ok(list.data)
    }

    /// Answer a blocked run with its tool outputs
    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: &[ToolOutput],
    ) -> Result<RunObject> {
        let body = json!({ "tool_outputs": tool_outputs });
        self.send(
            self.http
                .post(self.url(&format!(
                    "/threads/{}/runs/{}/submit_tool_outputs",
                    thread_id, run_id
                )))
                .json(&body),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_wire_decoding() {
        let run: RunObject = serde_json::from_str(
            r#"{"id":"run_1","status":"requires_action",
                "required_action":{"submit_tool_outputs":{"tool_calls":[
                    {"id":"call_1","function":{"name":"add_order_row","arguments":"{}"}}
                ]}},
                "last_error":null}"#,
        )
        .unwrap();

        assert_eq!(run.status, RunStatus::RequiresAction);
        assert!(run.status.is_active());
        let calls = &run.required_action.unwrap().submit_tool_outputs.tool_calls;
        assert_eq!(calls[0].function.name, "add_order_row");
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let run: RunObject = serde_json::from_str(
            r#"{"id":"run_2","status":"something_new","required_action":null,"last_error":null}"#,
        )
        .unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_terminal());
    }

    #[test]
    fn test_status_classification() {
        assert!(RunStatus::Queued.is_active());
        assert!(RunStatus::InProgress.is_active());
        assert!(!RunStatus::Completed.is_active());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Expired.is_terminal());
        assert!(!RunStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn test_message_text_extraction() {
        let message: MessageObject = serde_json::from_str(
            r#"{"id":"msg_1","role":"assistant","content":[
                {"text":null},
                {"text":{"value":"Your order is registered."}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(message.text(), Some("Your order is registered."));
    }
}
