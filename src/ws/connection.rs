//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single authenticated connection,
//! dispatching chat commands and forwarding events addressed to the
//! session's user channel or joined conversation groups.

use std::ops::ControlFlow;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage};
use super::subscription::SubscriptionManager;
use crate::auth::AuthUser;
use crate::domain::ChatEvent;
use crate::error::AppError;
use crate::service::{AuthService, ChatService};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them as the account's
///   current state: a lock closes the session, a promotion applies at once.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut caller: AuthUser,
    mut event_rx: broadcast::Receiver<ChatEvent>,
    chat: Arc<ChatService>,
    auth: Arc<AuthService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new(caller.id);
    tracing::info!(user_id = %caller.id, "ws connection opened");

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match handle_frame(&text, &mut caller, &mut subs, &chat, &auth).await {
                            ControlFlow::Continue(reply) => {
                                if ws_tx.send(Message::text(reply.to_text())).await.is_err() {
                                    break;
                                }
                            }
                            ControlFlow::Break(reply) => {
                                let _ = ws_tx.send(Message::text(reply.to_text())).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %caller.id, error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(chat_event) => {
                        if subs.matches(&chat_event) {
                            let payload = serde_json::to_value(&chat_event).unwrap_or_default();
                            let msg = WsMessage::event(payload);
                            if ws_tx.send(Message::text(msg.to_text())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(user_id = %caller.id, lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!(user_id = %caller.id, "ws connection closed");
}

/// Refreshes the caller from the store, then handles the frame. `Break`
/// carries the last envelope of a session whose account was locked or
/// deleted.
async fn handle_frame(
    text: &str,
    caller: &mut AuthUser,
    subs: &mut SubscriptionManager,
    chat: &ChatService,
    auth: &AuthService,
) -> ControlFlow<WsMessage, WsMessage> {
    match auth.current_user(caller.id).await {
        Ok(current) => *caller = current,
        Err(err) => {
            tracing::info!(user_id = %caller.id, error = %err, "ws session no longer authorized");
            return ControlFlow::Break(WsMessage::from_app_error("", &err));
        }
    }
    ControlFlow::Continue(handle_text_message(text, caller, subs, chat).await)
}

/// Handles a text frame and returns the envelope to send back.
async fn handle_text_message(
    text: &str,
    caller: &AuthUser,
    subs: &mut SubscriptionManager,
    chat: &ChatService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON");
    };
    let command = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(command) => command,
        Err(e) => return WsMessage::error(msg.id, 400, format!("invalid command: {e}")),
    };
    match dispatch(command, caller, subs, chat).await {
        Ok(payload) => WsMessage::response(msg.id, payload),
        Err(err) => {
            tracing::debug!(user_id = %caller.id, error = %err, "ws command failed");
            WsMessage::from_app_error(msg.id, &err)
        }
    }
}

/// Executes one command and returns the response payload.
async fn dispatch(
    command: WsCommand,
    caller: &AuthUser,
    subs: &mut SubscriptionManager,
    chat: &ChatService,
) -> Result<serde_json::Value, AppError> {
    match command {
        WsCommand::SendMessage(request) => {
            let message = chat.send(caller, request).await?;
            Ok(serde_json::json!({ "event": "receive_message", "message": message }))
        }
        WsCommand::MarkAsRead { conversation_id } => {
            let receipt = chat.mark_as_read(caller, conversation_id).await?;
            Ok(serde_json::json!({
                "event": "messages_marked_as_read",
                "conversation_id": receipt.conversation_id,
                "count": receipt.count,
                "read_at": receipt.read_at,
            }))
        }
        WsCommand::UpdateTyping {
            conversation_id,
            is_typing,
        } => {
            chat.update_typing(caller, conversation_id, is_typing).await?;
            Ok(serde_json::json!({
                "command": "update_typing",
                "conversation_id": conversation_id,
                "is_typing": is_typing,
            }))
        }
        WsCommand::JoinConversation { conversation_id } => {
            chat.member_of(caller.id, conversation_id).await?;
            if subs.join(conversation_id) {
                tracing::debug!(user_id = %caller.id, %conversation_id, groups = subs.count(), "joined conversation group");
            }
            Ok(serde_json::json!({
                "event": "joined_conversation",
                "conversation_id": conversation_id,
            }))
        }
        WsCommand::LeaveConversation { conversation_id } => {
            if subs.leave(conversation_id) {
                tracing::debug!(user_id = %caller.id, %conversation_id, "left conversation group");
            }
            Ok(serde_json::json!({
                "event": "left_conversation",
                "conversation_id": conversation_id,
            }))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::auth::TokenService;
    use crate::config::AppConfig;
    use crate::domain::user::NewUser;
    use crate::domain::{EventBus, Role, UserId};
    use crate::persistence::{MemoryStore, Store};
    use crate::ws::messages::WsMessageType;

    fn fixture() -> (AuthUser, SubscriptionManager, ChatService) {
        let caller = AuthUser {
            id: UserId::new(1),
            email: "s@x.io".into(),
            role: Role::Student,
        };
        let subs = SubscriptionManager::new(caller.id);
        let chat = ChatService::new(Arc::new(MemoryStore::new()), EventBus::new(16));
        (caller, subs, chat)
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let (caller, mut subs, chat) = fixture();
        let reply = handle_text_message("{oops", &caller, &mut subs, &chat).await;
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 400);
    }

    #[tokio::test]
    async fn joining_an_unknown_conversation_fails() {
        let (caller, mut subs, chat) = fixture();
        let frame = r#"{"id":"7","type":"command","payload":{"command":"join_conversation","conversation_id":42}}"#;
        let reply = handle_text_message(frame, &caller, &mut subs, &chat).await;
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.id, "7");
        assert_eq!(reply.payload["code"], 404);
        assert_eq!(subs.count(), 0);
    }

    #[tokio::test]
    async fn sessions_follow_the_stored_account() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let Ok(user) = store
            .insert_user(NewUser {
                email: "s@x.io".into(),
                password_hash: String::new(),
                full_name: None,
                role: Role::Student,
            })
            .await
        else {
            panic!("insert user failed");
        };
        let tokens = Arc::new(TokenService::new(&AppConfig::for_tests(std::env::temp_dir())));
        let auth = AuthService::new(Arc::clone(&store), tokens);
        let chat = ChatService::new(Arc::clone(&store), EventBus::new(16));
        let mut caller = AuthUser {
            id: user.id,
            email: user.email,
            role: Role::Employer,
        };
        let mut subs = SubscriptionManager::new(caller.id);
        let frame = r#"{"id":"1","type":"command","payload":{"command":"leave_conversation","conversation_id":1}}"#;

        let ControlFlow::Continue(reply) =
            handle_frame(frame, &mut caller, &mut subs, &chat, &auth).await
        else {
            panic!("active account should keep its session");
        };
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(caller.role, Role::Student);

        let Ok(true) = store.set_user_locked(caller.id, true).await else {
            panic!("lock failed");
        };
        let ControlFlow::Break(reply) =
            handle_frame(frame, &mut caller, &mut subs, &chat, &auth).await
        else {
            panic!("locked account should lose its session");
        };
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 401);
    }

    #[tokio::test]
    async fn leave_is_acknowledged() {
        let (caller, mut subs, chat) = fixture();
        let frame = r#"{"id":"8","type":"command","payload":{"command":"leave_conversation","conversationId":3}}"#;
        let reply = handle_text_message(frame, &caller, &mut subs, &chat).await;
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.payload["event"], "left_conversation");
    }
}
