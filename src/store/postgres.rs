//! Postgres-backed store. One transaction per mutating call; sequence
//! assignment rides the conversation row lock.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::{ConversationChanges, ConversationSummary};
use crate::models::{
    Conversation, ConversationKind, Message, MessageKind, Page, Participant, ParticipantRole,
};

use super::{NewConversation, NewMessage, Store};

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn conversation_from_row(row: &PgRow) -> Result<Conversation, AppError> {
    let kind: String = row.try_get("kind")?;
    let kind = ConversationKind::parse(&kind).ok_or_else(|| {
        tracing::error!(kind = %kind, "unknown conversation kind in store");
        AppError::Internal
    })?;
    Ok(Conversation {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        kind,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_private: row.try_get("is_private")?,
        created_by: row.try_get("created_by")?,
        last_sequence: row.try_get("last_sequence")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn participant_from_row(row: &PgRow) -> Result<Participant, AppError> {
    let role: String = row.try_get("role")?;
    let role = ParticipantRole::parse(&role).ok_or_else(|| {
        tracing::error!(role = %role, "unknown participant role in store");
        AppError::Internal
    })?;
    Ok(Participant {
        conversation_id: row.try_get("conversation_id")?,
        user_id: row.try_get("user_id")?,
        role,
        read_pointer: row.try_get("read_pointer")?,
        joined_at: row.try_get("joined_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, AppError> {
    let kind: String = row.try_get("kind")?;
    let kind = MessageKind::parse(&kind).ok_or_else(|| {
        tracing::error!(kind = %kind, "unknown message kind in store");
        AppError::Internal
    })?;
    let metadata: Option<serde_json::Value> = row.try_get("metadata")?;
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        author_id: row.try_get("author_id")?,
        sequence: row.try_get("sequence")?,
        content: row.try_get("content")?,
        kind,
        metadata: metadata.unwrap_or(serde_json::Value::Null),
        created_at: row.try_get("created_at")?,
        edited_at: row.try_get("edited_at")?,
        deleted: row.try_get("deleted")?,
    })
}

const CONVERSATION_COLUMNS: &str = "id, tenant_id, kind, name, description, is_private, \
     created_by, last_sequence, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, author_id, sequence, content, kind, metadata, created_at, \
     edited_at, deleted";

#[async_trait]
impl Store for PgStore {
    async fn user_in_tenant(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_conversation(
        &self,
        new: NewConversation,
        participants: &[(Uuid, ParticipantRole)],
    ) -> Result<Conversation, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO conversations (id, tenant_id, kind, name, description, is_private, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.tenant_id)
        .bind(new.kind.as_str())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.is_private)
        .bind(new.created_by)
        .fetch_one(&mut *tx)
        .await?;
        let conversation = conversation_from_row(&row)?;

        for (user_id, role) in participants {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, role) \
                 VALUES ($1, $2, $3)",
            )
            .bind(conversation.id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(conversation)
    }

    async fn conversation(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn list_conversations(
        &self,
        tenant_id: Uuid,
        requester: Uuid,
        only_participating: bool,
        page: Page,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = if only_participating {
            sqlx::query(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations c \
                 JOIN conversation_participants me \
                   ON me.conversation_id = c.id AND me.user_id = $2 \
                 WHERE c.tenant_id = $1 \
                 ORDER BY c.updated_at DESC LIMIT $3 OFFSET $4"
            ))
            .bind(tenant_id)
            .bind(requester)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations c \
                 WHERE c.tenant_id = $1 \
                 ORDER BY c.updated_at DESC LIMIT $2 OFFSET $3"
            ))
            .bind(tenant_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation = conversation_from_row(row)?;
            let unread_count = self.unread_count(conversation.id, requester).await?;
            let last_row = sqlx::query(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE conversation_id = $1 ORDER BY sequence DESC LIMIT 1"
            ))
            .bind(conversation.id)
            .fetch_optional(&self.pool)
            .await?;
            let last_message = last_row
                .as_ref()
                .map(message_from_row)
                .transpose()?
                .map(Message::redacted);
            out.push(ConversationSummary {
                conversation,
                unread_count,
                last_message,
            });
        }
        Ok(out)
    }

    async fn update_conversation(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: ConversationChanges,
    ) -> Result<Conversation, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE conversations SET \
                name = COALESCE($3, name), \
                description = COALESCE($4, description), \
                is_private = COALESCE($5, is_private), \
                updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.is_private)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;
        conversation_from_row(&row)
    }

    async fn delete_conversation(&self, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
        // Participants and messages go via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM conversations WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn participants(&self, conversation_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let rows = sqlx::query(
            "SELECT conversation_id, user_id, role, read_pointer, joined_at \
             FROM conversation_participants WHERE conversation_id = $1 ORDER BY joined_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(participant_from_row).collect()
    }

    async fn participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participant>, AppError> {
        let row = sqlx::query(
            "SELECT conversation_id, user_id, role, read_pointer, joined_at \
             FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    async fn add_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role) \
             VALUES ($1, $2, $3) ON CONFLICT (conversation_id, user_id) DO NOTHING",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await;
        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            // A vanished conversation surfaces as an FK violation.
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(AppError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn participant_count(&self, conversation_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM conversation_participants WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn set_participant_role(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE conversation_participants SET role = $3 \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn append_message(&self, new: NewMessage) -> Result<Message, AppError> {
        let mut tx = self.pool.begin().await?;

        // The UPDATE takes the conversation row lock, so concurrent
        // appenders to the same conversation get distinct sequences.
        let sequence: i64 = sqlx::query_scalar(
            "UPDATE conversations \
             SET last_sequence = last_sequence + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING last_sequence",
        )
        .bind(new.conversation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        let metadata = match &new.metadata {
            serde_json::Value::Null => None,
            other => Some(other.clone()),
        };
        let row = sqlx::query(&format!(
            "INSERT INTO messages (id, conversation_id, author_id, sequence, content, kind, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.conversation_id)
        .bind(new.author_id)
        .bind(sequence)
        .bind(&new.content)
        .bind(new.kind.as_str())
        .bind(metadata)
        .fetch_one(&mut *tx)
        .await?;
        let message = message_from_row(&row)?;

        tx.commit().await?;
        Ok(message)
    }

    async fn message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<Message>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 AND id = $2"
        ))
        .bind(conversation_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        content: String,
    ) -> Result<Message, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE messages SET content = $3, edited_at = NOW() \
             WHERE conversation_id = $1 AND id = $2 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(conversation_id)
        .bind(message_id)
        .bind(&content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;
        message_from_row(&row)
    }

    async fn soft_delete_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE messages SET deleted = TRUE WHERE conversation_id = $1 AND id = $2")
                .bind(conversation_id)
                .bind(message_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn messages(&self, conversation_id: Uuid, page: Page) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 \
             ORDER BY sequence ASC LIMIT $2 OFFSET $3"
        ))
        .bind(conversation_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64, AppError> {
        // Snapshot of last_sequence at call time; a racing append may or
        // may not be covered.
        let pointer: i64 = sqlx::query_scalar(
            "UPDATE conversation_participants p SET read_pointer = c.last_sequence \
             FROM conversations c \
             WHERE c.id = p.conversation_id AND p.conversation_id = $1 AND p.user_id = $2 \
             RETURNING p.read_pointer",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(pointer)
    }

    async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM messages m \
             JOIN conversation_participants p \
               ON p.conversation_id = m.conversation_id AND p.user_id = $2 \
             WHERE m.conversation_id = $1 \
               AND m.sequence > p.read_pointer \
               AND m.author_id <> $2 \
               AND NOT m.deleted",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
