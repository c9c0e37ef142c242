//! Case-scoped messaging between participants.
//!
//! Deliberately thin: the only rule this module owns is that sender and
//! recipient must both be case participants (owner, assigned counsel) or an
//! admin.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::post,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::{Actor, Role};
use crate::http::{self, ErrorKind, PageQuery};
use crate::workflows::cases::domain::{CaseId, CaseRecord, UserId};
use crate::workflows::cases::repository::{CaseRepository, LawyerRepository, RepositoryError};

static MESSAGE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_message_id() -> MessageId {
    let id = MESSAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MessageId(format!("msg-{id:06}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub case_number: CaseId,
    pub sender: UserId,
    pub recipient: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

pub trait MessageRepository: Send + Sync {
    fn insert(&self, message: Message) -> Result<Message, RepositoryError>;
    fn for_case(&self, case_id: &CaseId) -> Result<Vec<Message>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("sender and recipient must be case participants")]
    NotAParticipant,
    #[error("message body must not be empty")]
    EmptyBody,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MessageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MessageError::NotAParticipant => ErrorKind::Authorization,
            MessageError::EmptyBody => ErrorKind::Validation,
            MessageError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            MessageError::Repository(
                RepositoryError::Conflict | RepositoryError::CapacityExhausted,
            ) => ErrorKind::Conflict,
            MessageError::Repository(RepositoryError::Unavailable(_)) => ErrorKind::Server,
        }
    }
}

pub struct MessageService<M, C, L> {
    messages: Arc<M>,
    cases: Arc<C>,
    lawyers: Arc<L>,
}

impl<M, C, L> MessageService<M, C, L>
where
    M: MessageRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
{
    pub fn new(messages: Arc<M>, cases: Arc<C>, lawyers: Arc<L>) -> Self {
        Self {
            messages,
            cases,
            lawyers,
        }
    }

    pub fn send(
        &self,
        case_id: &CaseId,
        recipient: UserId,
        body: String,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Message, MessageError> {
        if body.trim().is_empty() {
            return Err(MessageError::EmptyBody);
        }

        let case = self
            .cases
            .fetch(case_id)?
            .ok_or(RepositoryError::NotFound)?;

        if !self.is_participant(&case, &actor.user_id, actor.role)? {
            return Err(MessageError::NotAParticipant);
        }
        if !self.is_participant(&case, &recipient, Role::User)? {
            return Err(MessageError::NotAParticipant);
        }

        let message = Message {
            message_id: next_message_id(),
            case_number: case.case_number.clone(),
            sender: actor.user_id.clone(),
            recipient,
            body,
            sent_at: now,
        };
        Ok(self.messages.insert(message)?)
    }

    pub fn list(&self, case_id: &CaseId, actor: &Actor) -> Result<Vec<Message>, MessageError> {
        let case = self
            .cases
            .fetch(case_id)?
            .ok_or(RepositoryError::NotFound)?;
        if !self.is_participant(&case, &actor.user_id, actor.role)? {
            return Err(MessageError::NotAParticipant);
        }
        Ok(self.messages.for_case(case_id)?)
    }

    fn is_participant(
        &self,
        case: &CaseRecord,
        user_id: &UserId,
        role: Role,
    ) -> Result<bool, MessageError> {
        if role == Role::Admin || &case.user_id == user_id {
            return Ok(true);
        }
        if let Some(case_lawyer) = &case.lawyer_id {
            if let Some(lawyer) = self.lawyers.fetch_by_user(user_id)? {
                return Ok(&lawyer.lawyer_id == case_lawyer);
            }
        }
        Ok(false)
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient: UserId,
    pub body: String,
}

pub fn message_router<M, C, L>(service: Arc<MessageService<M, C, L>>) -> Router
where
    M: MessageRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/cases/:case_id/messages",
            post(send_message::<M, C, L>).get(list_messages::<M, C, L>),
        )
        .with_state(service)
}

pub(crate) async fn send_message<M, C, L>(
    State(service): State<Arc<MessageService<M, C, L>>>,
    Extension(actor): Extension<Actor>,
    Path(case_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Response
where
    M: MessageRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
{
    match service.send(
        &CaseId(case_id),
        request.recipient,
        request.body,
        &actor,
        Utc::now(),
    ) {
        Ok(message) => http::created(message),
        Err(err) => http::failure(err.kind(), err.to_string()),
    }
}

pub(crate) async fn list_messages<M, C, L>(
    State(service): State<Arc<MessageService<M, C, L>>>,
    Extension(actor): Extension<Actor>,
    Path(case_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response
where
    M: MessageRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
{
    match service.list(&CaseId(case_id), &actor) {
        Ok(messages) => {
            let (items, info) = http::paginate(messages, query);
            http::page(items, info)
        }
        Err(err) => http::failure(err.kind(), err.to_string()),
    }
}
