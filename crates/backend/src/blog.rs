// =============================================================================
// Rooted Hearts Backend - Blog API
// =============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthUser};
use crate::db::BlogPost;
use crate::error::AppError;
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct BlogPostResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub author: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<BlogPost> for BlogPostResponse {
    fn from(p: BlogPost) -> Self {
        Self {
            tags: p.tag_list(),
            id: p.id,
            title: p.title,
            slug: p.slug,
            excerpt: p.excerpt,
            content: p.content,
            author: p.author,
            category: p.category,
            published: p.published,
            created_at: p.created_at,
            updated_at: p.updated_at,
            published_at: p.published_at,
        }
    }
}

/// URL slug: lowercase ASCII alphanumerics separated by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

async fn ensure_slug_free(state: &AppState, slug: &str, post_id: &str) -> Result<(), AppError> {
    if slug.is_empty() {
        return Err(AppError::BadRequest("Slug must contain letters or digits".into()));
    }
    match state.db.find_blog_post_by_slug(slug).await? {
        Some(existing) if existing.id != post_id => {
            Err(AppError::Conflict(format!("Slug '{}' is already in use", slug)))
        }
        _ => Ok(()),
    }
}

fn tags_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".into())
}

// =============================================================================
// Public Handlers
// =============================================================================

pub async fn list_published_posts(
    State(state): State<AppState>,
) -> Result<Json<Vec<BlogPostResponse>>, AppError> {
    let posts = state.db.list_blog_posts(true).await?;
    Ok(Json(posts.into_iter().map(BlogPostResponse::from).collect()))
}

pub async fn get_published_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPostResponse>, AppError> {
    let post = state
        .db
        .find_blog_post_by_slug(&slug)
        .await?
        .filter(|p| p.published)
        .ok_or(AppError::NotFound)?;
    Ok(Json(post.into()))
}

// =============================================================================
// Admin Handlers
// =============================================================================

pub async fn list_all_posts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<BlogPostResponse>>, AppError> {
    require_admin(&auth.load(&state).await?)?;
    let posts = state.db.list_blog_posts(false).await?;
    Ok(Json(posts.into_iter().map(BlogPostResponse::from).collect()))
}

pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = auth.load(&state).await?;
    require_admin(&admin)?;

    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(AppError::BadRequest("Title and content are required".into()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let slug = slugify(req.slug.as_deref().unwrap_or(&req.title));
    ensure_slug_free(&state, &slug, &id).await?;

    let now = Utc::now();
    let post = BlogPost {
        id,
        title: req.title.trim().to_string(),
        slug,
        excerpt: req.excerpt,
        content: req.content,
        author: admin.display_name,
        category: req.category,
        tags: tags_json(&req.tags),
        published: req.published,
        created_at: now,
        updated_at: now,
        published_at: req.published.then_some(now),
    };
    state.db.upsert_blog_post(&post).await?;

    tracing::info!(post_id = %post.id, slug = %post.slug, "Blog post created");
    Ok((StatusCode::CREATED, Json(BlogPostResponse::from(post))))
}

pub async fn update_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<BlogPostResponse>, AppError> {
    require_admin(&auth.load(&state).await?)?;

    let mut post = state.db.find_blog_post(&id).await?.ok_or(AppError::NotFound)?;
    let now = Utc::now();

    if let Some(title) = req.title {
        post.title = title.trim().to_string();
    }
    if let Some(slug) = req.slug {
        let slug = slugify(&slug);
        ensure_slug_free(&state, &slug, &post.id).await?;
        post.slug = slug;
    }
    if let Some(excerpt) = req.excerpt {
        post.excerpt = Some(excerpt);
    }
    if let Some(content) = req.content {
        post.content = content;
    }
    if let Some(category) = req.category {
        post.category = Some(category);
    }
    if let Some(tags) = req.tags {
        post.tags = tags_json(&tags);
    }
    if let Some(published) = req.published {
        // First publication sets the date; unpublishing keeps it
        if published && post.published_at.is_none() {
            post.published_at = Some(now);
        }
        post.published = published;
    }
    if post.title.is_empty() || post.content.trim().is_empty() {
        return Err(AppError::BadRequest("Title and content are required".into()));
    }
    post.updated_at = now;

    state.db.upsert_blog_post(&post).await?;
    Ok(Json(post.into()))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_admin(&auth.load(&state).await?)?;

    if !state.db.delete_blog_post(&id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(post_id = %id, "Blog post deleted");
    Ok(StatusCode::NO_CONTENT)
}
