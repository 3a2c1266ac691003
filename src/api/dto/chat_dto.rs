//! Conversation, AI assistant and file DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{JobPostId, UserId};

/// Request body for `POST /chat/conversations`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartConversationRequest {
    /// The other participant.
    #[serde(alias = "recipientId")]
    pub recipient_id: UserId,
    /// Job post the conversation is about.
    #[serde(default, alias = "jobPostId")]
    pub job_post_id: Option<JobPostId>,
}

/// Request body for `POST /ai-chat`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AiChatRequest {
    /// User message.
    pub message: String,
}

/// Response body for `POST /ai-chat/restart`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RestartResponse {
    /// Sessions that were ended.
    pub ended_sessions: u64,
}

/// Query addressing a stored file by its public URL.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileUrlParams {
    /// `/uploads/<folder>/<file>`.
    #[serde(alias = "fileUrl")]
    pub url: String,
}
