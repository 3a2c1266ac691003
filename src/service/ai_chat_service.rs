//! AI assistant service.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::AuthUser;
use crate::domain::ai_chat::{
    AiReply, AiRole, DEFAULT_SESSION_TITLE, HISTORY_MESSAGE_LIMIT, estimate_tokens,
    select_history,
};
use crate::error::AppError;
use crate::llm::{ChatCompletion, PromptMessage};
use crate::persistence::Store;

/// Instructions sent ahead of every conversation.
const SYSTEM_PROMPT: &str = "You are a helpful assistant for a part-time job board. \
Help students find suitable jobs and prepare applications, and help employers \
write clear job posts. Answer concisely.";

/// Runs assistant conversations against the model runtime.
#[derive(Debug, Clone)]
pub struct AiChatService {
    store: Arc<dyn Store>,
    model: Arc<dyn ChatCompletion>,
}

impl AiChatService {
    /// Creates a new `AiChatService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, model: Arc<dyn ChatCompletion>) -> Self {
        Self { store, model }
    }

    /// Sends a message in the caller's active session and returns the
    /// assistant's reply. Both turns are stored once the model answers.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a blank message and
    /// [`AppError::Upstream`] when the model call fails.
    pub async fn chat(&self, caller: &AuthUser, message: &str) -> Result<AiReply, AppError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::invalid("message cannot be empty"));
        }

        let session = self
            .store
            .active_ai_session(caller.id, DEFAULT_SESSION_TITLE)
            .await?;
        let history = select_history(
            self.store
                .recent_ai_messages(session.id, HISTORY_MESSAGE_LIMIT)
                .await?,
        );

        let mut prompt = Vec::with_capacity(history.len() + 2);
        prompt.push(PromptMessage::new(AiRole::System, SYSTEM_PROMPT));
        prompt.extend(
            history
                .into_iter()
                .map(|m| PromptMessage::new(m.role, m.content)),
        );
        prompt.push(PromptMessage::new(AiRole::User, message));

        let reply = self.model.complete(&prompt).await.map_err(|e| {
            tracing::error!(session_id = %session.id, error = %e, "model call failed");
            AppError::from(e)
        })?;

        self.store
            .append_ai_message(
                session.id,
                AiRole::User,
                message.to_string(),
                estimate_tokens(message),
            )
            .await?;
        if !reply.is_empty() {
            self.store
                .append_ai_message(
                    session.id,
                    AiRole::Assistant,
                    reply.clone(),
                    estimate_tokens(&reply),
                )
                .await?;
        }
        tracing::info!(
            session_id = %session.id,
            user_id = %caller.id,
            history = prompt.len() - 2,
            "assistant replied"
        );
        Ok(AiReply {
            session_id: session.id,
            reply,
        })
    }

    /// Ends every active session of the caller; the next message starts a
    /// fresh one.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn restart(&self, caller: &AuthUser) -> Result<u64, AppError> {
        let ended = self.store.end_ai_sessions(caller.id, Utc::now()).await?;
        tracing::info!(user_id = %caller.id, ended, "assistant sessions ended");
        Ok(ended)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{Role, UserId};
    use crate::llm::LlmError;
    use crate::persistence::MemoryStore;

    /// Replies with a fixed text and remembers every prompt.
    #[derive(Debug, Default)]
    struct ScriptedModel {
        reply: String,
        fail: bool,
        prompts: Mutex<Vec<Vec<PromptMessage>>>,
    }

    #[async_trait]
    impl ChatCompletion for ScriptedModel {
        async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(messages.to_vec());
            }
            if self.fail {
                Err(LlmError::Api {
                    status: 500,
                    message: "boom".into(),
                })
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    fn caller() -> AuthUser {
        AuthUser {
            id: UserId::new(7),
            email: "s@x.io".into(),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn history_is_replayed_in_order() {
        let model = Arc::new(ScriptedModel {
            reply: "Sure!".into(),
            ..ScriptedModel::default()
        });
        let completion: Arc<dyn ChatCompletion> = Arc::clone(&model) as Arc<dyn ChatCompletion>;
        let service = AiChatService::new(Arc::new(MemoryStore::new()), completion);

        let Ok(first) = service.chat(&caller(), "find me a job").await else {
            panic!("chat failed");
        };
        assert_eq!(first.reply, "Sure!");
        let Ok(second) = service.chat(&caller(), "in Hanoi").await else {
            panic!("chat failed");
        };
        assert_eq!(first.session_id, second.session_id);

        let Ok(prompts) = model.prompts.lock() else {
            panic!("poisoned");
        };
        let Some(last) = prompts.last() else {
            panic!("no prompt recorded");
        };
        let turns: Vec<(AiRole, &str)> =
            last.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            turns,
            [
                (AiRole::System, SYSTEM_PROMPT),
                (AiRole::User, "find me a job"),
                (AiRole::Assistant, "Sure!"),
                (AiRole::User, "in Hanoi"),
            ]
        );
    }

    #[tokio::test]
    async fn restart_starts_a_new_session() {
        let model: Arc<dyn ChatCompletion> = Arc::new(ScriptedModel {
            reply: "ok".into(),
            ..ScriptedModel::default()
        });
        let service = AiChatService::new(Arc::new(MemoryStore::new()), model);
        let Ok(first) = service.chat(&caller(), "hello").await else {
            panic!("chat failed");
        };
        assert!(matches!(service.restart(&caller()).await, Ok(1)));
        let Ok(second) = service.chat(&caller(), "hello again").await else {
            panic!("chat failed");
        };
        assert_ne!(first.session_id, second.session_id);
    }

    #[tokio::test]
    async fn blank_messages_and_model_failures() {
        let model: Arc<dyn ChatCompletion> = Arc::new(ScriptedModel {
            fail: true,
            ..ScriptedModel::default()
        });
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = AiChatService::new(Arc::clone(&store), model);
        assert!(matches!(
            service.chat(&caller(), "   ").await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.chat(&caller(), "hi").await,
            Err(AppError::Upstream(_))
        ));
        let Ok(session) = store.active_ai_session(caller().id, DEFAULT_SESSION_TITLE).await else {
            panic!("session missing");
        };
        let Ok(stored) = store.recent_ai_messages(session.id, 10).await else {
            panic!("read failed");
        };
        assert!(stored.is_empty());
    }
}
