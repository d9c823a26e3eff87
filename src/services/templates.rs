//! Template service — publish, list, and load shared tier list templates.
//!
//! DESIGN
//! ======
//! A template is a titled, flattened item list (rows top to bottom, then the
//! bank) plus the author's identity. Loading one into a board goes through
//! `Board::import_template`, which resets rows and puts every item in the
//! bank.
//!
//! Validation runs before any database work so a bad request never opens a
//! transaction. Publishing writes the template and all its items in one
//! transaction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::board::model::Item;

pub const MAX_TITLE_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 280;
pub const COMMUNITY_LIST_LIMIT: i64 = 50;
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template title is required")]
    EmptyTitle,
    #[error("template title exceeds {MAX_TITLE_CHARS} characters")]
    TitleTooLong,
    #[error("template description exceeds {MAX_DESCRIPTION_CHARS} characters")]
    DescriptionTooLong,
    #[error("template has no items")]
    EmptyItems,
    #[error("template not found: {0}")]
    NotFound(Uuid),
    #[error("template store is not configured")]
    Unavailable,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for TemplateError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTitle => "E_TEMPLATE_EMPTY_TITLE",
            Self::TitleTooLong => "E_TEMPLATE_TITLE_TOO_LONG",
            Self::DescriptionTooLong => "E_TEMPLATE_DESCRIPTION_TOO_LONG",
            Self::EmptyItems => "E_TEMPLATE_EMPTY_ITEMS",
            Self::NotFound(_) => "E_TEMPLATE_NOT_FOUND",
            Self::Unavailable => "E_TEMPLATE_UNAVAILABLE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Identity of the user publishing a template.
#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateRecord {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub author_id: Uuid,
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub created_at_ms: i64,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, rename = "author")]
    pub author_id: Option<Uuid>,
}

type TemplateRow = (Uuid, String, Option<String>, Uuid, String, Option<String>, i64);

// =============================================================================
// VALIDATION
// =============================================================================

/// Check a template before publishing.
///
/// # Errors
///
/// Returns the first rule the template breaks.
pub fn validate(template: &NewTemplate, items: &[Item]) -> Result<(), TemplateError> {
    let title = template.title.trim();
    if title.is_empty() {
        return Err(TemplateError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(TemplateError::TitleTooLong);
    }
    if template
        .description
        .as_deref()
        .is_some_and(|d| d.trim().chars().count() > MAX_DESCRIPTION_CHARS)
    {
        return Err(TemplateError::DescriptionTooLong);
    }
    if items.is_empty() {
        return Err(TemplateError::EmptyItems);
    }
    Ok(())
}

/// Public display name: the first word of the full name.
#[must_use]
pub fn author_display_name(author: &Author) -> String {
    author
        .full_name
        .as_deref()
        .and_then(|name| name.split_whitespace().next())
        .unwrap_or(ANONYMOUS_AUTHOR)
        .to_owned()
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('%');
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

// =============================================================================
// PUBLISH / LIST / GET
// =============================================================================

/// Publish a template built from a board's flattened items.
///
/// # Errors
///
/// Returns a validation error, or a database error if the insert fails.
pub async fn publish(pool: &PgPool, author: &Author, template: &NewTemplate, items: Vec<Item>) -> Result<TemplateRecord, TemplateError> {
    validate(template, &items)?;

    let id = Uuid::new_v4();
    let title = template.title.trim().to_owned();
    let description = template
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_owned);
    let author_name = author_display_name(author);

    let mut tx = pool.begin().await?;
    let created_at_ms = sqlx::query_scalar::<_, i64>(
        "INSERT INTO tier_templates (id, title, description, author_id, author_name, author_avatar)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING (extract(epoch from created_at) * 1000)::bigint",
    )
    .bind(id)
    .bind(&title)
    .bind(&description)
    .bind(author.id)
    .bind(&author_name)
    .bind(&author.avatar_url)
    .fetch_one(tx.as_mut())
    .await?;

    let mut builder = QueryBuilder::new("INSERT INTO template_items (template_id, position, item_data) ");
    builder.push_values(items.iter().enumerate(), |mut row, (position, item)| {
        row.push_bind(id)
            .push_bind(i32::try_from(position).unwrap_or(i32::MAX))
            .push_bind(Json(item.clone()));
    });
    builder.build().execute(tx.as_mut()).await?;
    tx.commit().await?;

    info!(template_id = %id, author_id = %author.id, items = items.len(), "template published");

    Ok(TemplateRecord {
        id,
        title,
        description,
        author_id: author.id,
        author_name,
        author_avatar: author.avatar_url.clone(),
        created_at_ms,
        items,
    })
}

/// Build the listing query. The community listing shows public templates
/// only, capped at `COMMUNITY_LIST_LIMIT`; an author filter returns every
/// template by that author.
fn list_query(query: &TemplateQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT id, title, description, author_id, author_name, author_avatar,
                (extract(epoch from created_at) * 1000)::bigint
         FROM tier_templates",
    );
    match query.author_id {
        Some(author_id) => {
            builder.push(" WHERE author_id = ");
            builder.push_bind(author_id);
        }
        None => {
            builder.push(" WHERE is_public");
        }
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = escape_like(search);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR author_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    builder.push(" ORDER BY created_at DESC");
    if query.author_id.is_none() {
        builder.push(" LIMIT ");
        builder.push_bind(COMMUNITY_LIST_LIMIT);
    }
    builder
}

/// List templates, newest first.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list(pool: &PgPool, query: &TemplateQuery) -> Result<Vec<TemplateRecord>, TemplateError> {
    let mut builder = list_query(query);
    let rows = builder.build_query_as::<TemplateRow>().fetch_all(pool).await?;
    let ids: Vec<Uuid> = rows.iter().map(|row| row.0).collect();
    let mut items = load_items(pool, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let template_items = items.remove(&row.0).unwrap_or_default();
            to_record(row, template_items)
        })
        .collect())
}

/// Fetch one template with its items.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id, or a database error.
pub async fn get(pool: &PgPool, template_id: Uuid) -> Result<TemplateRecord, TemplateError> {
    let row = sqlx::query_as::<_, TemplateRow>(
        "SELECT id, title, description, author_id, author_name, author_avatar,
                (extract(epoch from created_at) * 1000)::bigint
         FROM tier_templates
         WHERE id = $1",
    )
    .bind(template_id)
    .fetch_optional(pool)
    .await?
    .ok_or(TemplateError::NotFound(template_id))?;

    let mut items = load_items(pool, &[template_id]).await?;
    Ok(to_record(row, items.remove(&template_id).unwrap_or_default()))
}

async fn load_items(pool: &PgPool, template_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Item>>, TemplateError> {
    if template_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, (Uuid, Json<Item>)>(
        "SELECT template_id, item_data
         FROM template_items
         WHERE template_id = ANY($1)
         ORDER BY template_id, position ASC",
    )
    .bind(template_ids)
    .fetch_all(pool)
    .await?;

    let mut out: HashMap<Uuid, Vec<Item>> = HashMap::new();
    for (template_id, Json(item)) in rows {
        out.entry(template_id).or_default().push(item);
    }
    Ok(out)
}

fn to_record(row: TemplateRow, items: Vec<Item>) -> TemplateRecord {
    let (id, title, description, author_id, author_name, author_avatar, created_at_ms) = row;
    TemplateRecord { id, title, description, author_id, author_name, author_avatar, created_at_ms, items }
}

#[cfg(test)]
#[path = "templates_test.rs"]
mod tests;
