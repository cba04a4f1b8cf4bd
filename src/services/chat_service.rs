use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, OnConflict};
use uuid::Uuid;

use crate::{
    dto::chat::{
        ConversationList, ConversationSummary, MessageList, Participant, SendMessageRequest,
        StartConversationRequest,
    },
    entity::{
        conversations::{
            ActiveModel as ConversationActive, Column as ConvCol, Entity as Conversations,
            Model as ConversationModel,
        },
        enums::NotificationKind,
        messages::{ActiveModel as MessageActive, Column as MsgCol, Entity as Messages},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Message,
    notify::{self, NewNotification},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub const MAX_MESSAGE_LEN: usize = 2000;

/// Conversations are stored with the smaller id first so a pair maps to one row.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b { (a, b) } else { (b, a) }
}

fn validate_content(content: &str) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("message content is required".into()));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::BadRequest(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

async fn active_counterpart(state: &AppState, me: Uuid, other: Uuid) -> AppResult<UserModel> {
    if me == other {
        return Err(AppError::BadRequest("You cannot message yourself".into()));
    }
    Users::find_by_id(other)
        .filter(UserCol::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn get_or_create_conversation<C: ConnectionTrait>(
    conn: &C,
    a: Uuid,
    b: Uuid,
) -> AppResult<ConversationModel> {
    let (one, two) = ordered_pair(a, b);

    Conversations::insert(ConversationActive {
        id: Set(Uuid::new_v4()),
        participant_one: Set(one),
        participant_two: Set(two),
        last_message_id: Set(None),
        last_message_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    })
    .on_conflict(
        OnConflict::columns([ConvCol::ParticipantOne, ConvCol::ParticipantTwo])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    Conversations::find()
        .filter(ConvCol::ParticipantOne.eq(one))
        .filter(ConvCol::ParticipantTwo.eq(two))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn summarize(
    state: &AppState,
    me: Uuid,
    conversations: Vec<ConversationModel>,
) -> AppResult<Vec<ConversationSummary>> {
    if conversations.is_empty() {
        return Ok(Vec::new());
    }

    let other_ids: Vec<Uuid> = conversations.iter().map(|c| c.other_participant(me)).collect();
    let participants: HashMap<Uuid, UserModel> = Users::find()
        .filter(UserCol::Id.is_in(other_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let last_ids: Vec<Uuid> = conversations.iter().filter_map(|c| c.last_message_id).collect();
    let mut last_messages: HashMap<Uuid, Message> = HashMap::new();
    if !last_ids.is_empty() {
        for msg in Messages::find()
            .filter(MsgCol::Id.is_in(last_ids))
            .all(&state.orm)
            .await?
        {
            last_messages.insert(msg.id, Message::from(msg));
        }
    }

    let conversation_ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();
    let unread: HashMap<Uuid, i64> = Messages::find()
        .select_only()
        .column(MsgCol::ConversationId)
        .column_as(Expr::col(MsgCol::Id).count(), "unread")
        .filter(MsgCol::ConversationId.is_in(conversation_ids))
        .filter(MsgCol::RecipientId.eq(me))
        .filter(MsgCol::ReadAt.is_null())
        .group_by(MsgCol::ConversationId)
        .into_tuple::<(Uuid, i64)>()
        .all(&state.orm)
        .await?
        .into_iter()
        .collect();

    Ok(conversations
        .into_iter()
        .map(|c| {
            let other = c.other_participant(me);
            ConversationSummary {
                id: c.id,
                participant: participants.get(&other).map(|u| Participant {
                    id: u.id,
                    name: u.name.clone(),
                    role: u.role,
                }),
                last_message: c.last_message_id.and_then(|id| last_messages.remove(&id)),
                last_message_at: c.last_message_at.map(|dt| dt.with_timezone(&Utc)),
                unread_count: unread.get(&c.id).copied().unwrap_or(0),
            }
        })
        .collect())
}

pub async fn send_message(
    state: &AppState,
    user: &AuthUser,
    payload: SendMessageRequest,
) -> AppResult<ApiResponse<Message>> {
    let content = validate_content(&payload.content)?;
    active_counterpart(state, user.user_id, payload.recipient_id).await?;

    let txn = state.orm.begin().await?;
    let conversation = get_or_create_conversation(&txn, user.user_id, payload.recipient_id).await?;

    let message = MessageActive {
        id: Set(Uuid::new_v4()),
        conversation_id: Set(conversation.id),
        sender_id: Set(user.user_id),
        recipient_id: Set(payload.recipient_id),
        content: Set(content),
        read_at: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut active: ConversationActive = conversation.into();
    active.last_message_id = Set(Some(message.id));
    active.last_message_at = Set(Some(message.created_at));
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;
    txn.commit().await?;

    let preview: String = message.content.chars().take(80).collect();
    notify::dispatch(
        state,
        &[payload.recipient_id],
        NewNotification::new(NotificationKind::NewMessage, "New message", preview).with_data(
            serde_json::json!({
                "conversation_id": message.conversation_id,
                "sender_id": user.user_id,
            }),
        ),
    )
    .await;

    Ok(ApiResponse::success("Message sent", Message::from(message), Some(Meta::empty())))
}

pub async fn start_conversation(
    state: &AppState,
    user: &AuthUser,
    payload: StartConversationRequest,
) -> AppResult<ApiResponse<ConversationSummary>> {
    active_counterpart(state, user.user_id, payload.participant_id).await?;
    let conversation =
        get_or_create_conversation(&state.orm, user.user_id, payload.participant_id).await?;

    let summary = summarize(state, user.user_id, vec![conversation])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Conversation", summary, Some(Meta::empty())))
}

pub async fn list_conversations(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ConversationList>> {
    let page = pagination.normalize();
    let finder = Conversations::find()
        .filter(
            Condition::any()
                .add(ConvCol::ParticipantOne.eq(user.user_id))
                .add(ConvCol::ParticipantTwo.eq(user.user_id)),
        )
        .order_by_desc(ConvCol::UpdatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let conversations = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?;

    let items = summarize(state, user.user_id, conversations).await?;
    Ok(ApiResponse::success(
        "Conversations",
        ConversationList { items },
        Some(Meta::paged(&page, total)),
    ))
}

/// Newest first. Opening a conversation marks everything addressed to the caller as read.
pub async fn list_messages(
    state: &AppState,
    user: &AuthUser,
    conversation_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<MessageList>> {
    let conversation = Conversations::find_by_id(conversation_id)
        .one(&state.orm)
        .await?
        .filter(|c| c.includes(user.user_id))
        .ok_or(AppError::NotFound)?;

    let marked = Messages::update_many()
        .col_expr(MsgCol::ReadAt, Expr::current_timestamp().into())
        .filter(MsgCol::ConversationId.eq(conversation.id))
        .filter(MsgCol::RecipientId.eq(user.user_id))
        .filter(MsgCol::ReadAt.is_null())
        .exec(&state.orm)
        .await?;
    if marked.rows_affected > 0 {
        tracing::debug!(conversation_id = %conversation.id, count = marked.rows_affected, "messages marked read");
    }

    let page = pagination.normalize();
    let finder = Messages::find()
        .filter(MsgCol::ConversationId.eq(conversation.id))
        .order_by_desc(MsgCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(page.per_page)
        .offset(page.offset)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Message::from)
        .collect();

    Ok(ApiResponse::success(
        "Messages",
        MessageList { items },
        Some(Meta::paged(&page, total)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_order_is_stable() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
        let (one, two) = ordered_pair(a, b);
        assert!(one < two);
    }

    #[test]
    fn content_is_trimmed_and_bounded() {
        assert_eq!(validate_content("  hi  ").unwrap(), "hi");
        assert!(validate_content("   ").is_err());
        assert!(validate_content(&"x".repeat(MAX_MESSAGE_LEN + 1)).is_err());
    }
}
