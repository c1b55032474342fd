//! Comment Service
//!
//! Task discussion with mentions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::access::{self, AccessError, TaskScope};
use super::activity_service::{ActivityRecorder, NewActivity};
use super::notification_service::{NotificationDraft, NotificationService};
use crate::application::dto::request::CreateCommentRequest;
use crate::application::realtime::{DeletedRef, EventBroadcaster, RealtimeEvent};
use crate::domain::services::{AccessLevel, AccessPolicy};
use crate::domain::{
    ActivityAction, Comment, EntityType, NotificationKind, Repositories, MAX_COMMENT_LENGTH,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::parse_ids;

/// Longest excerpt of a comment carried in notification bodies
const EXCERPT_CHARS: usize = 140;

#[async_trait]
pub trait CommentService: Send + Sync {
    /// Comments of a task, oldest first
    async fn list(&self, user_id: i64, task_id: i64, page: PageRequest) -> Result<Page<Comment>, CommentError>;

    async fn create(
        &self,
        user_id: i64,
        task_id: i64,
        request: CreateCommentRequest,
    ) -> Result<Comment, CommentError>;

    /// Edit own comment
    async fn update(&self, user_id: i64, comment_id: i64, content: String) -> Result<Comment, CommentError>;

    async fn delete(&self, user_id: i64, comment_id: i64) -> Result<(), CommentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Comment must be 1-5000 characters")]
    InvalidContent,

    #[error("Mentioned users must have access to the project")]
    InvalidMentions,

    #[error("Only the author can edit a comment")]
    NotAuthor,

    #[error("Only the author or a project manager can delete a comment")]
    CannotDelete,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<CommentError> for AppError {
    fn from(e: CommentError) -> Self {
        match e {
            CommentError::Access(e) => e.into(),
            CommentError::InvalidContent => AppError::invalid_field("content", e.to_string()),
            CommentError::InvalidMentions => AppError::invalid_field("mentions", e.to_string()),
            CommentError::NotAuthor | CommentError::CannotDelete => AppError::Forbidden(e.to_string()),
            CommentError::Repository(e) => e,
        }
    }
}

fn normalize_content(content: &str) -> Result<String, CommentError> {
    let content = content.trim();
    if content.is_empty() || content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CommentError::InvalidContent);
    }
    Ok(content.to_string())
}

fn excerpt(content: &str) -> String {
    if content.chars().count() <= EXCERPT_CHARS {
        return content.to_string();
    }
    let mut out: String = content.chars().take(EXCERPT_CHARS).collect();
    out.push('…');
    out
}

pub struct CommentServiceImpl {
    repos: Repositories,
    id_generator: Arc<SnowflakeGenerator>,
    events: Arc<dyn EventBroadcaster>,
    notifications: Arc<dyn NotificationService>,
    activity: ActivityRecorder,
}

impl CommentServiceImpl {
    pub fn new(
        repos: Repositories,
        id_generator: Arc<SnowflakeGenerator>,
        events: Arc<dyn EventBroadcaster>,
        notifications: Arc<dyn NotificationService>,
        activity: ActivityRecorder,
    ) -> Self {
        Self {
            repos,
            id_generator,
            events,
            notifications,
            activity,
        }
    }

    async fn load(
        &self,
        user_id: i64,
        comment_id: i64,
        required: AccessLevel,
    ) -> Result<(Comment, TaskScope), CommentError> {
        let comment = self
            .repos
            .comments
            .find_by_id(comment_id)
            .await?
            .ok_or(AccessError::NotFound("Comment"))?;
        let scope = access::task_scope(&self.repos, comment.task_id, user_id, required)
            .await
            .map_err(|e| match e {
                AccessError::NotFound(_) => AccessError::NotFound("Comment"),
                other => other,
            })?;
        Ok((comment, scope))
    }

    /// Mentioned users get `mentioned`; other watchers get `comment_added`.
    async fn notify(&self, scope: &TaskScope, comment: &Comment) {
        let task = &scope.task;
        let body = Some(excerpt(&comment.content));

        let mentioned = NotificationDraft {
            kind: NotificationKind::Mentioned,
            actor_id: Some(comment.author_id),
            title: format!("You were mentioned on \"{}\"", task.title),
            body: body.clone(),
            entity_type: EntityType::Task,
            entity_id: task.id,
        };
        let watchers: Vec<i64> = task
            .watchers()
            .into_iter()
            .filter(|id| !comment.mentions.contains(id))
            .collect();
        let added = NotificationDraft {
            kind: NotificationKind::CommentAdded,
            actor_id: Some(comment.author_id),
            title: format!("New comment on \"{}\"", task.title),
            body,
            entity_type: EntityType::Task,
            entity_id: task.id,
        };

        for (recipients, draft) in [(comment.mentions.clone(), mentioned), (watchers, added)] {
            let recipients = access::viewers_among(&scope.scope, &recipients);
            if recipients.is_empty() {
                continue;
            }
            if let Err(e) = self.notifications.notify(&recipients, draft).await {
                tracing::warn!(comment_id = comment.id, error = %e, "Failed to enqueue comment notification");
            }
        }
    }
}

#[async_trait]
impl CommentService for CommentServiceImpl {
    async fn list(&self, user_id: i64, task_id: i64, page: PageRequest) -> Result<Page<Comment>, CommentError> {
        access::task_scope(&self.repos, task_id, user_id, AccessLevel::Viewer).await?;
        Ok(self.repos.comments.list_for_task(task_id, page).await?)
    }

    async fn create(
        &self,
        user_id: i64,
        task_id: i64,
        request: CreateCommentRequest,
    ) -> Result<Comment, CommentError> {
        let scope = access::task_scope(&self.repos, task_id, user_id, AccessLevel::Contributor).await?;
        let content = normalize_content(&request.content)?;

        let mentions = parse_ids(&request.mentions, "user")?;
        if access::viewers_among(&scope.scope, &mentions).len() != mentions.len() {
            return Err(CommentError::InvalidMentions);
        }

        let comment = Comment::new(self.id_generator.generate(), task_id, user_id, content, mentions);
        let comment = self.repos.comments.create(&comment).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Comment, comment.id, ActivityAction::Created)
                    .in_task(&scope),
            )
            .await;
        self.events
            .publish(&scope.rooms(), RealtimeEvent::CommentCreated(comment.clone().into()));
        self.notify(&scope, &comment).await;

        Ok(comment)
    }

    async fn update(&self, user_id: i64, comment_id: i64, content: String) -> Result<Comment, CommentError> {
        let (mut comment, scope) = self.load(user_id, comment_id, AccessLevel::Viewer).await?;
        if !AccessPolicy::can_edit_comment(&comment, user_id) {
            return Err(CommentError::NotAuthor);
        }

        let content = normalize_content(&content)?;
        if content != comment.content {
            let now = Utc::now();
            comment.content = content;
            comment.edited_at = Some(now);
            comment.updated_at = now;
            comment = self.repos.comments.update(&comment).await?;

            self.activity
                .record(
                    NewActivity::new(user_id, EntityType::Comment, comment.id, ActivityAction::Updated)
                        .in_task(&scope),
                )
                .await;
            self.events
                .publish(&scope.rooms(), RealtimeEvent::CommentUpdated(comment.clone().into()));
        }

        Ok(comment)
    }

    async fn delete(&self, user_id: i64, comment_id: i64) -> Result<(), CommentError> {
        let (comment, scope) = self.load(user_id, comment_id, AccessLevel::Viewer).await?;
        if !AccessPolicy::can_delete_comment(&comment, user_id, scope.scope.level) {
            return Err(CommentError::CannotDelete);
        }

        self.repos.comments.soft_delete(comment_id, Utc::now()).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Comment, comment_id, ActivityAction::Deleted)
                    .in_task(&scope)
                    .with_metadata(json!({ "author_id": comment.author_id.to_string() })),
            )
            .await;
        self.events.publish(
            &scope.rooms(),
            RealtimeEvent::CommentDeleted(DeletedRef::new(comment_id, Some(comment.task_id))),
        );
        Ok(())
    }
}
