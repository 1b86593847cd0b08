use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::{
    agent::{run_to_completion, wait_for_active_runs},
    core::search::{format_hits, SearchHit},
    error::{AppError, Result},
    models::chat::{ChatMessage, ChatRole},
    utils::validate_file_extension,
    AppState,
};

use super::responses::ApiResponse;

/// Response for an image search, optionally carrying the agent's reply
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Ranked hits, best first
    pub hits: Vec<SearchHit>,
    /// The formatted text block that is forwarded to the agent
    pub results_text: String,
    /// Assistant reply, when a thread id accompanied the upload
    pub assistant_reply: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Spool upload bytes into a temp file that is deleted on drop, so bad
/// uploads cannot leave files behind in the OS temp dir
fn persist_upload(content: &[u8], extension: &str) -> Result<NamedTempFile> {
    let mut temp_file = tempfile::Builder::new()
        .prefix(&format!("{}-", Uuid::new_v4()))
        .suffix(&format!(".{}", extension))
        .tempfile()?;
    temp_file.write_all(content)?;

    Ok(temp_file)
}

/// Upload an image, run the similarity search, and optionally forward the
/// results to an existing thread for the assistant to comment on.
pub async fn search_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut temp_file = None;
    let mut thread_id = None;

    // Process the multipart form data
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .ok_or_else(|| AppError::UploadError("No filename provided".to_string()))?
                    .to_string();

                let allowed: Vec<&str> = state
                    .config
                    .allowed_extensions
                    .iter()
                    .map(String::as_str)
                    .collect();
                if !validate_file_extension(&file_name, &allowed) {
                    return Err(AppError::UploadError("Unsupported file type".to_string()));
                }

                let extension = std::path::Path::new(&file_name)
                    .extension()
                    .and_then(|s| s.to_str())
                    .unwrap_or("")
                    .to_lowercase();

                let content = field.bytes().await?;
                if content.len() as u64 > state.config.max_upload_size {
                    return Err(AppError::UploadError("File too large".to_string()));
                }

                temp_file = Some(persist_upload(&content, &extension)?);
            }
            "thread_id" => {
                thread_id = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let temp_file =
        temp_file.ok_or_else(|| AppError::UploadError("No file provided".to_string()))?;

    // Embed the query image and scan the bank; the temp file is removed
    // when it drops, whether or not decoding succeeds
    let search_result = {
        let img = image::open(temp_file.path())?;
        let model = state.model.lock().await;
        let embedding = model.compute_embedding(&img)?;
        state.index.search(&embedding, state.config.top_k)
    };
    drop(temp_file);

    let results_text = format_hits(&search_result);

    // Forward the results to the assistant when a thread was named
    let assistant_reply = match thread_id {
        Some(thread_id) if !thread_id.is_empty() => {
            state.threads().get(&thread_id)?;

            wait_for_active_runs(&state.agent, &thread_id).await?;
            state
                .agent
                .add_message(&thread_id, &format!("Image search results: {}", results_text))
                .await?;
            let reply = run_to_completion(&state.agent, &state.ledger(), &thread_id).await?;

            let history = state.history();
            let mut messages = history.load(&thread_id)?;
            messages.push(ChatMessage::user(format!(
                "Similarity search results by local model on uploaded image: {}",
                results_text
            )));
            messages.push(ChatMessage::assistant(reply.clone()));
            history.save(&thread_id, &messages)?;

            Some(reply)
        }
        _ => None,
    };

    Ok(Json(ApiResponse::success(SearchResponse {
        hits: search_result,
        results_text,
        assistant_reply,
    })))
}

/// Create a remote thread and record it locally under a unique name
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateThreadRequest>,
) -> Result<impl IntoResponse> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Please enter a thread name".to_string()));
    }

    // Check the name before creating anything remote
    let registry = state.threads();
    let lowered = name.to_lowercase();
    if registry
        .load()?
        .values()
        .any(|info| info.name.to_lowercase() == lowered)
    {
        return Err(AppError::Validation(
            "A thread with this name already exists".to_string(),
        ));
    }

    let thread = state.agent.create_thread().await?;
    let info = registry.register(&thread.id, name)?;

    tracing::info!("Created thread {} ({})", thread.id, info.name);

    Ok(Json(ApiResponse::success(ThreadResponse {
        thread_id: thread.id,
        name: info.name,
        created_at: info.created_at,
    })))
}

/// List locally known threads, newest first
pub async fn list_threads(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let threads = state
        .threads()
        .list()?
        .into_iter()
        .map(|(thread_id, info)| ThreadResponse {
            thread_id,
            name: info.name,
            created_at: info.created_at,
        })
        .collect::<Vec<_>>();

    Ok(Json(ApiResponse::success(threads)))
}

/// Send a user message to a thread and return the assistant's reply
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    if request.content.trim().is_empty() {
        return Err(AppError::InvalidInput("Message content is empty".to_string()));
    }
    state.threads().get(&thread_id)?;

    wait_for_active_runs(&state.agent, &thread_id).await?;
    state.agent.add_message(&thread_id, &request.content).await?;
    let reply = run_to_completion(&state.agent, &state.ledger(), &thread_id).await?;

    let history = state.history();
    let mut messages = history.load(&thread_id)?;
    messages.push(ChatMessage {
        role: ChatRole::User,
        content: request.content,
    });
    messages.push(ChatMessage::assistant(reply.clone()));
    history.save(&thread_id, &messages)?;

    Ok(Json(ApiResponse::success(ChatReply { reply })))
}

/// Stored chat history for a thread
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.threads().get(&thread_id)?;
    let messages = state.history().load(&thread_id)?;

    Ok(Json(ApiResponse::success(messages)))
}

/// Current contents of the order ledger
pub async fn list_orders(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let orders = state.ledger().load()?;
    Ok(Json(ApiResponse::success(orders)))
}
