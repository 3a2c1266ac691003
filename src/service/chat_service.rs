//! Chat service: conversation resolution, messages, read state, typing
//! indicators and event fan-out.
//!
//! Every mutation follows the same pattern: check membership, write
//! through the store, publish a [`ChatEvent`], return the result. REST
//! handlers and WebSocket commands share these methods, so both surfaces
//! emit identical events.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::domain::chat::{
    Conversation, ConversationSummary, MessageView, ParticipantPair, SendMessage, not_a_member,
    preview, validate_content,
};
use crate::domain::user::User;
use crate::domain::{ChatEvent, ConversationId, EventBus, JobPostId, Page, PageRequest, UserId};
use crate::error::AppError;
use crate::persistence::Store;

/// Result of marking a conversation as read.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadReceipt {
    /// Conversation.
    pub conversation_id: ConversationId,
    /// Messages that changed state.
    pub count: u64,
    /// Timestamp written on those messages.
    pub read_at: DateTime<Utc>,
}

/// Orchestration layer for chat.
#[derive(Debug, Clone)]
pub struct ChatService {
    store: Arc<dyn Store>,
    event_bus: EventBus,
}

impl ChatService {
    /// Creates a new `ChatService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Finds or creates the conversation between the caller and
    /// `recipient`. The job post is only recorded when the conversation is
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown recipient or job post
    /// and [`AppError::InvalidRequest`] unless the two users are one
    /// employer and one student.
    pub async fn resolve(
        &self,
        caller: &AuthUser,
        recipient: UserId,
        job_post: Option<JobPostId>,
    ) -> Result<Conversation, AppError> {
        let other = self
            .store
            .user(recipient)
            .await?
            .ok_or_else(|| AppError::not_found("recipient"))?;
        let pair = ParticipantPair::resolve((caller.id, caller.role), (other.id, other.role))?;
        if let Some(job) = job_post
            && self.store.job_post(job).await?.is_none()
        {
            return Err(AppError::not_found("job post"));
        }
        let (conversation, created) = self
            .store
            .find_or_create_conversation(pair, job_post, Utc::now())
            .await?;
        if created {
            tracing::info!(
                conversation_id = %conversation.id,
                employer_id = %pair.employer_id,
                student_id = %pair.student_id,
                "conversation created"
            );
        }
        Ok(conversation)
    }

    /// Opens (or reopens) a conversation and returns its summary.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve`].
    pub async fn start(
        &self,
        caller: &AuthUser,
        recipient: UserId,
        job_post: Option<JobPostId>,
    ) -> Result<ConversationSummary, AppError> {
        let conversation = self.resolve(caller, recipient, job_post).await?;
        self.summarize_one(caller.id, conversation).await
    }

    /// Appends a message and notifies the recipient's user channel.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for invalid content or when
    /// neither a conversation nor a recipient is given,
    /// [`AppError::Forbidden`] when the caller is not a participant, and
    /// the errors of [`Self::resolve`].
    pub async fn send(&self, caller: &AuthUser, request: SendMessage) -> Result<MessageView, AppError> {
        let content = validate_content(&request.content)?;
        let conversation = match (request.conversation_id, request.recipient_id) {
            (Some(id), _) => self.member_of(caller.id, id).await?,
            (None, Some(recipient)) => self.resolve(caller, recipient, request.job_post_id).await?,
            (None, None) => {
                return Err(AppError::invalid("conversation_id or recipient_id is required"));
            }
        };
        let recipient = conversation
            .counterpart(caller.id)
            .ok_or_else(not_a_member)?;

        let snippet = preview(&content);
        let message = self
            .store
            .append_message(conversation.id, caller.id, content, snippet, Utc::now())
            .await?;
        let sender_name = self.display_name(caller.id).await?;
        let view = MessageView::new(message, sender_name);

        let delivered = self.event_bus.publish(ChatEvent::MessageReceived {
            recipient_id: recipient,
            message: view.clone(),
        });
        tracing::info!(
            conversation_id = %conversation.id,
            message_id = %view.id,
            sender = %caller.id,
            delivered,
            "message sent"
        );
        Ok(view)
    }

    /// Marks every message the caller has not read as read and sends a
    /// receipt to the other participant.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] or [`AppError::Forbidden`] when the
    /// conversation is unknown or the caller is not a participant.
    pub async fn mark_as_read(
        &self,
        caller: &AuthUser,
        conversation_id: ConversationId,
    ) -> Result<ReadReceipt, AppError> {
        let conversation = self.member_of(caller.id, conversation_id).await?;
        let read_at = Utc::now();
        let count = self
            .store
            .mark_read(conversation_id, caller.id, read_at)
            .await?;
        if count > 0
            && let Some(sender_id) = conversation.counterpart(caller.id)
        {
            let _ = self.event_bus.publish(ChatEvent::MessagesRead {
                conversation_id,
                reader_id: caller.id,
                sender_id,
                count,
                read_at,
            });
            tracing::debug!(%conversation_id, reader = %caller.id, count, "messages read");
        }
        Ok(ReadReceipt {
            conversation_id,
            count,
            read_at,
        })
    }

    /// Stores the caller's typing flag and notifies the conversation group.
    ///
    /// # Errors
    ///
    /// As [`Self::mark_as_read`].
    pub async fn update_typing(
        &self,
        caller: &AuthUser,
        conversation_id: ConversationId,
        is_typing: bool,
    ) -> Result<(), AppError> {
        self.store
            .set_typing(conversation_id, caller.id, is_typing)
            .await?;
        let _ = self.event_bus.publish(ChatEvent::TypingChanged {
            conversation_id,
            user_id: caller.id,
            is_typing,
        });
        Ok(())
    }

    /// Loads a conversation the user takes part in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids and
    /// [`AppError::Forbidden`] for non-participants.
    pub async fn member_of(
        &self,
        user: UserId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, AppError> {
        let conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("conversation"))?;
        if conversation.has_participant(user) {
            Ok(conversation)
        } else {
            Err(not_a_member())
        }
    }

    /// The caller's conversations, most recent activity first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn conversations(
        &self,
        caller: &AuthUser,
        page: PageRequest,
    ) -> Result<Page<ConversationSummary>, AppError> {
        let page = self.store.conversations_for_user(caller.id, page).await?;
        let summaries = self.summarize(caller.id, page.data).await?;
        Ok(Page {
            data: summaries,
            pagination: page.pagination,
        })
    }

    /// One conversation as seen by the caller.
    ///
    /// # Errors
    ///
    /// As [`Self::member_of`].
    pub async fn conversation(
        &self,
        caller: &AuthUser,
        conversation_id: ConversationId,
    ) -> Result<ConversationSummary, AppError> {
        let conversation = self.member_of(caller.id, conversation_id).await?;
        self.summarize_one(caller.id, conversation).await
    }

    /// A page of messages, counted back from the newest and returned in
    /// chronological order.
    ///
    /// # Errors
    ///
    /// As [`Self::member_of`].
    pub async fn messages(
        &self,
        caller: &AuthUser,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> Result<Page<MessageView>, AppError> {
        let conversation = self.member_of(caller.id, conversation_id).await?;
        let names = self
            .names(&[conversation.employer_id, conversation.student_id])
            .await?;
        let page = self.store.messages(conversation_id, page).await?;
        Ok(page.map(|m| {
            let name = names.get(&m.sender_id).cloned().unwrap_or_default();
            MessageView::new(m, name)
        }))
    }

    /// Messages unread by the caller across all conversations.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn unread_total(&self, caller: &AuthUser) -> Result<i64, AppError> {
        self.store.total_unread(caller.id).await
    }

    async fn summarize_one(
        &self,
        viewer: UserId,
        conversation: Conversation,
    ) -> Result<ConversationSummary, AppError> {
        self.summarize(viewer, vec![conversation])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("empty conversation summary".into()))
    }

    async fn summarize(
        &self,
        viewer: UserId,
        conversations: Vec<Conversation>,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let participants: Vec<UserId> = conversations
            .iter()
            .flat_map(|c| [c.employer_id, c.student_id])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names = self.names(&participants).await?;

        let mut titles: HashMap<JobPostId, String> = HashMap::new();
        for job in conversations.iter().filter_map(|c| c.job_post_id) {
            if titles.contains_key(&job) {
                continue;
            }
            if let Some(post) = self.store.job_post(job).await? {
                titles.insert(job, post.title);
            }
        }

        let ids: Vec<ConversationId> = conversations.iter().map(|c| c.id).collect();
        let unread: HashMap<ConversationId, i64> = self
            .store
            .unread_counts(viewer, &ids)
            .await?
            .into_iter()
            .collect();

        let mut out = Vec::with_capacity(conversations.len());
        for c in conversations {
            let unread_count = unread.get(&c.id).copied().unwrap_or(0);
            out.push(ConversationSummary {
                id: c.id,
                employer_id: c.employer_id,
                employer_name: names.get(&c.employer_id).cloned().unwrap_or_default(),
                student_id: c.student_id,
                student_name: names.get(&c.student_id).cloned().unwrap_or_default(),
                job_post_id: c.job_post_id,
                job_post_title: c.job_post_id.and_then(|j| titles.get(&j).cloned()),
                last_message_at: c.last_message_at,
                last_message: c.last_message,
                is_employer_typing: c.is_employer_typing,
                is_student_typing: c.is_student_typing,
                unread_count,
                created_at: c.created_at,
            });
        }
        Ok(out)
    }

    async fn names(&self, ids: &[UserId]) -> Result<HashMap<UserId, String>, AppError> {
        Ok(self
            .store
            .users(ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name()))
            .collect())
    }

    async fn display_name(&self, id: UserId) -> Result<String, AppError> {
        Ok(self
            .store
            .user(id)
            .await?
            .as_ref()
            .map(User::display_name)
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::domain::chat::PREVIEW_CHARS;
    use crate::domain::user::NewUser;
    use crate::persistence::MemoryStore;

    struct Fixture {
        chat: ChatService,
        employer: AuthUser,
        student: AuthUser,
        other_student: AuthUser,
    }

    async fn user(store: &Arc<dyn Store>, email: &str, name: Option<&str>, role: Role) -> AuthUser {
        let Ok(user) = store
            .insert_user(NewUser {
                email: email.into(),
                password_hash: String::new(),
                full_name: name.map(str::to_string),
                role,
            })
            .await
        else {
            panic!("insert user failed");
        };
        AuthUser {
            id: user.id,
            email: user.email,
            role,
        }
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let employer = user(&store, "boss@x.io", Some("Boss"), Role::Employer).await;
        let student = user(&store, "stu@x.io", None, Role::Student).await;
        let other_student = user(&store, "other@x.io", None, Role::Student).await;
        Fixture {
            chat: ChatService::new(store, EventBus::new(64)),
            employer,
            student,
            other_student,
        }
    }

    fn to(recipient: UserId, content: &str) -> SendMessage {
        SendMessage {
            recipient_id: Some(recipient),
            content: content.into(),
            ..SendMessage::default()
        }
    }

    #[tokio::test]
    async fn resolver_is_keyed_by_the_pair() {
        let f = fixture().await;
        let Ok(a) = f.chat.resolve(&f.student, f.employer.id, None).await else {
            panic!("resolve failed");
        };
        let Ok(b) = f.chat.resolve(&f.employer, f.student.id, None).await else {
            panic!("resolve failed");
        };
        assert_eq!(a.id, b.id);
        assert_eq!(a.employer_id, f.employer.id);
        assert_eq!(a.student_id, f.student.id);

        assert!(matches!(
            f.chat.resolve(&f.student, f.other_student.id, None).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            f.chat.resolve(&f.student, UserId::new(999), None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn send_publishes_to_the_recipient_and_updates_preview() {
        let f = fixture().await;
        let mut rx = f.chat.event_bus().subscribe();
        let long = "x".repeat(PREVIEW_CHARS + 20);
        let Ok(view) = f.chat.send(&f.employer, to(f.student.id, &long)).await else {
            panic!("send failed");
        };
        assert_eq!(view.sender_name, "Boss");

        let Ok(event) = rx.try_recv() else {
            panic!("expected an event");
        };
        let ChatEvent::MessageReceived { recipient_id, message } = event else {
            panic!("expected receive_message");
        };
        assert_eq!(recipient_id, f.student.id);
        assert_eq!(message.id, view.id);

        let Ok(summary) = f.chat.conversation(&f.student, view.conversation_id).await else {
            panic!("summary failed");
        };
        let Some(last) = summary.last_message else {
            panic!("preview missing");
        };
        assert!(last.ends_with("..."));
        assert_eq!(last.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(summary.unread_count, 1);
        assert_eq!(summary.employer_name, "Boss");
        assert_eq!(summary.student_name, "stu@x.io");
    }

    #[tokio::test]
    async fn outsiders_cannot_post_or_read() {
        let f = fixture().await;
        let Ok(view) = f.chat.send(&f.employer, to(f.student.id, "hello")).await else {
            panic!("send failed");
        };
        let into_existing = SendMessage {
            conversation_id: Some(view.conversation_id),
            content: "let me in".into(),
            ..SendMessage::default()
        };
        assert!(matches!(
            f.chat.send(&f.other_student, into_existing).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.chat
                .messages(&f.other_student, view.conversation_id, PageRequest::default())
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.chat.send(&f.employer, to(f.student.id, "   ")).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            f.chat.send(&f.employer, SendMessage::default()).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn mark_as_read_counts_and_notifies_the_sender() {
        let f = fixture().await;
        for text in ["one", "two", "three"] {
            assert!(f.chat.send(&f.employer, to(f.student.id, text)).await.is_ok());
        }
        let Ok(reply) = f.chat.send(&f.student, to(f.employer.id, "hi")).await else {
            panic!("send failed");
        };
        let conversation = reply.conversation_id;
        assert!(matches!(f.chat.unread_total(&f.student).await, Ok(3)));

        let mut rx = f.chat.event_bus().subscribe();
        let Ok(receipt) = f.chat.mark_as_read(&f.student, conversation).await else {
            panic!("mark failed");
        };
        assert_eq!(receipt.count, 3);
        let Ok(ChatEvent::MessagesRead { sender_id, count, .. }) = rx.try_recv() else {
            panic!("expected a read receipt");
        };
        assert_eq!(sender_id, f.employer.id);
        assert_eq!(count, 3);

        let Ok(again) = f.chat.mark_as_read(&f.student, conversation).await else {
            panic!("mark failed");
        };
        assert_eq!(again.count, 0);
        assert!(rx.try_recv().is_err());
        assert!(matches!(f.chat.unread_total(&f.employer).await, Ok(1)));
    }

    #[tokio::test]
    async fn typing_is_stored_and_broadcast_to_the_group() {
        let f = fixture().await;
        let Ok(conversation) = f.chat.resolve(&f.student, f.employer.id, None).await else {
            panic!("resolve failed");
        };
        let mut rx = f.chat.event_bus().subscribe();
        assert!(f.chat.update_typing(&f.student, conversation.id, true).await.is_ok());
        let Ok(event) = rx.try_recv() else {
            panic!("expected typing event");
        };
        assert_eq!(event.excluded_user(), Some(f.student.id));

        let Ok(summary) = f.chat.conversation(&f.employer, conversation.id).await else {
            panic!("summary failed");
        };
        assert!(summary.is_student_typing);
        assert!(!summary.is_employer_typing);

        assert!(matches!(
            f.chat
                .update_typing(&f.other_student, conversation.id, true)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn message_pages_are_chronological() {
        let f = fixture().await;
        for text in ["m1", "m2", "m3", "m4", "m5"] {
            assert!(f.chat.send(&f.employer, to(f.student.id, text)).await.is_ok());
        }
        let Ok(conversation) = f.chat.resolve(&f.student, f.employer.id, None).await else {
            panic!("resolve failed");
        };
        let Ok(latest) = f
            .chat
            .messages(&f.student, conversation.id, PageRequest::new(1, 2))
            .await
        else {
            panic!("messages failed");
        };
        let contents: Vec<&str> = latest.data.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m4", "m5"]);
        assert_eq!(latest.pagination.total, 5);
    }

    #[tokio::test]
    async fn summaries_carry_per_conversation_unread_counts() {
        let f = fixture().await;
        for (to_user, text) in [
            (f.student.id, "a"),
            (f.student.id, "b"),
            (f.other_student.id, "c"),
        ] {
            assert!(f.chat.send(&f.employer, to(to_user, text)).await.is_ok());
        }
        assert!(f.chat.send(&f.student, to(f.employer.id, "reply")).await.is_ok());

        let Ok(mine) = f.chat.conversations(&f.employer, PageRequest::default()).await else {
            panic!("conversations failed");
        };
        let mut counts: Vec<(UserId, i64)> =
            mine.data.iter().map(|c| (c.student_id, c.unread_count)).collect();
        counts.sort();
        let mut expected = vec![(f.student.id, 1), (f.other_student.id, 0)];
        expected.sort();
        assert_eq!(counts, expected);

        let Ok(theirs) = f.chat.conversations(&f.student, PageRequest::default()).await else {
            panic!("conversations failed");
        };
        assert_eq!(
            theirs.data.iter().map(|c| c.unread_count).collect::<Vec<_>>(),
            [2]
        );
    }
}
