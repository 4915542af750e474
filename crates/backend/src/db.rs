// =============================================================================
// Rooted Hearts Backend - Database Layer
// =============================================================================
// Table of Contents:
// 1. Models
// 2. Connection & Migrations
// 3. Users
// 4. Assessment Attempts
// 5. Conversations
// 6. Reports & Support
// 7. Moderation
// 8. Blog
// 9. Dashboard Stats
// =============================================================================

use chrono::{DateTime, Utc};
use rooted_hearts_common::assessment::{check_attempt_allowed, AssessmentError, AssessmentResult};
use rooted_hearts_common::interaction::{Message, PhotoConsent};
use rooted_hearts_common::moderation::{ModerationAction, ReportStatus, SupportStatus};
use rooted_hearts_common::{
    BackgroundCheckStatus, Conversation, InteractionError, MembershipTier, UserStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite, SqliteConnection};
use std::collections::HashSet;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

// -----------------------------------------------------------------------------
// 1. Models
// -----------------------------------------------------------------------------

/// User model.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub interests: String,
    pub photo_url: Option<String>,
    pub assessment_passed: bool,
    pub alignment_score: Option<i64>,
    pub last_assessment_at: Option<DateTime<Utc>>,
    pub membership_tier: String,
    pub user_status: String,
    pub suspension_end_date: Option<DateTime<Utc>>,
    pub background_check_status: String,
    pub warning_count: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Stored status. Unknown values are treated as Growth Mode.
    pub fn status(&self) -> UserStatus {
        self.user_status.parse().unwrap_or(UserStatus::NeedsGrowth)
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> UserStatus {
        self.status().effective(self.suspension_end_date, now)
    }

    pub fn membership(&self) -> MembershipTier {
        self.membership_tier.parse().unwrap_or(MembershipTier::Monthly)
    }

    pub fn background_check(&self) -> BackgroundCheckStatus {
        self.background_check_status
            .parse()
            .unwrap_or(BackgroundCheckStatus::NotStarted)
    }

    pub fn interest_list(&self) -> Vec<String> {
        serde_json::from_str(&self.interests).unwrap_or_default()
    }
}

/// The signed-in user's own view of their account.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub photo_url: Option<String>,
    pub assessment_passed: bool,
    pub alignment_score: Option<i64>,
    pub last_assessment_at: Option<DateTime<Utc>>,
    pub membership_tier: MembershipTier,
    pub user_status: UserStatus,
    pub suspension_end_date: Option<DateTime<Utc>>,
    pub background_check_status: BackgroundCheckStatus,
    pub warning_count: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            interests: u.interest_list(),
            membership_tier: u.membership(),
            user_status: u.status(),
            background_check_status: u.background_check(),
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            age: u.age,
            gender: u.gender,
            location: u.location,
            bio: u.bio,
            photo_url: u.photo_url,
            assessment_passed: u.assessment_passed,
            alignment_score: u.alignment_score,
            last_assessment_at: u.last_assessment_at,
            suspension_end_date: u.suspension_end_date,
            warning_count: u.warning_count,
            is_admin: u.is_admin,
            created_at: u.created_at,
        }
    }
}

/// Fields accepted when creating a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub display_name: &'a str,
    pub membership_tier: MembershipTier,
    pub is_admin: bool,
}

/// Editable profile fields; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    pub photo_url: Option<String>,
}

/// Stored assessment attempt.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssessmentAttempt {
    pub id: String,
    pub user_id: String,
    pub total_score: i64,
    pub percentage: i64,
    pub passed: bool,
    pub red_flag_count: i64,
    pub category_scores: String,
    pub integrity_flags: String,
    pub growth_areas: String,
    pub completed_at: DateTime<Utc>,
}

impl AssessmentAttempt {
    /// Rebuild the scored result this attempt was created from.
    pub fn to_result(&self) -> AssessmentResult {
        AssessmentResult {
            total_score: self.total_score as u32,
            percentage: self.percentage as u8,
            passed: self.passed,
            category_scores: serde_json::from_str(&self.category_scores).unwrap_or_default(),
            integrity_flags: serde_json::from_str(&self.integrity_flags).unwrap_or_default(),
            growth_areas: serde_json::from_str(&self.growth_areas).unwrap_or_default(),
            red_flag_count: self.red_flag_count as usize,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: String,
    initiator_id: String,
    recipient_id: String,
    initiator_consented: bool,
    initiator_consented_at: Option<DateTime<Utc>>,
    recipient_consented: bool,
    recipient_consented_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    sender_id: String,
    body: String,
    kind: String,
    sent_at: DateTime<Utc>,
}

/// User report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Report {
    pub id: String,
    pub reporter_id: String,
    pub reported_user_id: String,
    pub reason: String,
    pub details: String,
    pub status: String,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn report_status(&self) -> ReportStatus {
        self.status.parse().unwrap_or(ReportStatus::Pending)
    }
}

/// Support ticket.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SupportMessage {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupportMessage {
    pub fn support_status(&self) -> SupportStatus {
        self.status.parse().unwrap_or(SupportStatus::Unread)
    }
}

/// Audit log entry for an admin action.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ModerationRecord {
    pub id: String,
    pub user_id: String,
    pub admin_id: String,
    pub action: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Blog post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub author: String,
    pub category: Option<String>,
    pub tags: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl BlogPost {
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub active_users: i64,
    pub suspended_users: i64,
    pub growth_mode_users: i64,
    pub assessments_taken: i64,
    pub assessments_passed: i64,
    pub pending_reports: i64,
    pub unread_support: i64,
    pub conversations: i64,
    pub photos_unlocked: i64,
}

// -----------------------------------------------------------------------------
// 2. Connection & Migrations
// -----------------------------------------------------------------------------

impl Database {
    /// Create a new database connection pool.
    pub async fn new(url: &str) -> Result<Self, sqlx::Error> {
        let in_memory = url.contains(":memory:");

        // Add create_if_missing option for SQLite files
        let url_with_options = if in_memory || !url.starts_with("sqlite:") {
            url.to_string()
        } else if !url.contains('?') {
            format!("{}?mode=rwc", url)
        } else if !url.contains("mode=") {
            format!("{}&mode=rwc", url)
        } else {
            url.to_string()
        };

        // An in-memory database lives only as long as its connection
        let options = if in_memory {
            SqlitePoolOptions::new().max_connections(1).min_connections(1)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(&url_with_options).await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    #[cfg(test)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        // Users table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                display_name TEXT NOT NULL,
                age INTEGER,
                gender TEXT,
                location TEXT,
                bio TEXT,
                interests TEXT NOT NULL DEFAULT '[]',
                photo_url TEXT,
                assessment_passed INTEGER NOT NULL DEFAULT 0,
                alignment_score INTEGER,
                last_assessment_at TEXT,
                membership_tier TEXT NOT NULL DEFAULT 'monthly',
                user_status TEXT NOT NULL DEFAULT 'needs-growth',
                suspension_end_date TEXT,
                background_check_status TEXT NOT NULL DEFAULT 'not-started',
                warning_count INTEGER NOT NULL DEFAULT 0,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Assessment attempts table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS assessment_attempts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                total_score INTEGER NOT NULL,
                percentage INTEGER NOT NULL,
                passed INTEGER NOT NULL,
                red_flag_count INTEGER NOT NULL,
                category_scores TEXT NOT NULL,
                integrity_flags TEXT NOT NULL,
                growth_areas TEXT NOT NULL,
                completed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Conversations table; status is derived, never stored
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                initiator_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                initiator_consented INTEGER NOT NULL DEFAULT 0,
                initiator_consented_at TEXT,
                recipient_consented INTEGER NOT NULL DEFAULT 0,
                recipient_consented_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Messages table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id TEXT NOT NULL,
                body TEXT NOT NULL,
                kind TEXT NOT NULL,
                sent_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Reports table (kept after the reported account is removed)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id TEXT PRIMARY KEY,
                reporter_id TEXT NOT NULL,
                reported_user_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                details TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                admin_notes TEXT,
                created_at TEXT NOT NULL,
                resolved_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Support messages table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS support_messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'unread',
                admin_response TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Moderation audit log
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS moderation_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                admin_id TEXT NOT NULL,
                action TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Identities of removed accounts
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS revoked_identities (
                email TEXT PRIMARY KEY,
                reason TEXT NOT NULL,
                revoked_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Blog posts table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                excerpt TEXT,
                content TEXT NOT NULL,
                author TEXT NOT NULL,
                category TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                published INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                published_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes for performance
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_status ON users(user_status, assessment_passed)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_attempts_user ON assessment_attempts(user_id, completed_at)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_conversations_initiator ON conversations(initiator_id)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_conversations_recipient ON conversations(recipient_id)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, sent_at)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status)")
            .execute(&self.pool)
            .await;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // 3. Users
    // -------------------------------------------------------------------------

    /// Find user by ID.
    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find user by email (case-insensitive).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
    }

    /// Load a user, moving an elapsed suspension into Growth Mode first.
    pub async fn load_user(&self, id: &str, now: DateTime<Utc>) -> Result<Option<User>, sqlx::Error> {
        let Some(user) = self.find_user_by_id(id).await? else {
            return Ok(None);
        };

        if user.status() == UserStatus::Suspended
            && user.effective_status(now) == UserStatus::NeedsGrowth
        {
            sqlx::query(
                r#"
                UPDATE users
                SET user_status = ?, suspension_end_date = NULL, assessment_passed = 0, updated_at = ?
                WHERE id = ? AND user_status = ?
                "#,
            )
            .bind(UserStatus::NeedsGrowth.as_str())
            .bind(now.to_rfc3339())
            .bind(id)
            .bind(UserStatus::Suspended.as_str())
            .execute(&self.pool)
            .await?;

            tracing::info!(user_id = %id, "Suspension elapsed, user moved to growth mode");
            return self.find_user_by_id(id).await;
        }

        Ok(Some(user))
    }

    /// Create a new user in Growth Mode.
    pub async fn create_user(&self, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, membership_tier, user_status, is_admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_user.id)
        .bind(normalize_email(new_user.email))
        .bind(new_user.password_hash)
        .bind(new_user.display_name)
        .bind(new_user.membership_tier.as_str())
        .bind(UserStatus::NeedsGrowth.as_str())
        .bind(new_user.is_admin)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_user_by_id(new_user.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Apply a partial profile update.
    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<(), sqlx::Error> {
        let interests = update
            .interests
            .as_ref()
            .map(|i| serde_json::to_string(i).unwrap_or_else(|_| "[]".into()));

        sqlx::query(
            r#"
            UPDATE users
            SET display_name = COALESCE(?, display_name),
                age = COALESCE(?, age),
                gender = COALESCE(?, gender),
                location = COALESCE(?, location),
                bio = COALESCE(?, bio),
                interests = COALESCE(?, interests),
                photo_url = COALESCE(?, photo_url),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.display_name)
        .bind(update.age)
        .bind(&update.gender)
        .bind(&update.location)
        .bind(&update.bio)
        .bind(interests)
        .bind(&update.photo_url)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_membership(&self, id: &str, tier: MembershipTier) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET membership_tier = ?, updated_at = ? WHERE id = ?")
            .bind(tier.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_background_check(
        &self,
        id: &str,
        status: BackgroundCheckStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET background_check_status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All users, newest first (admin view).
    pub async fn list_users(&self, status: Option<UserStatus>) -> Result<Vec<User>, sqlx::Error> {
        match status {
            Some(status) => {
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users WHERE user_status = ? ORDER BY created_at DESC",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }

    /// Members visible in browse: active and passed, excluding the viewer.
    pub async fn browse_profiles(
        &self,
        viewer_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE id != ? AND user_status = ? AND assessment_passed = 1
            ORDER BY alignment_score DESC, created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(viewer_id)
        .bind(UserStatus::Active.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn is_identity_revoked(&self, email: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT email FROM revoked_identities WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    // -------------------------------------------------------------------------
    // 4. Assessment Attempts
    // -------------------------------------------------------------------------

    /// Store an attempt and apply its placement to the user record.
    ///
    /// The suspension and cooldown checks run inside the same transaction as
    /// the write. Nothing is stored when either check fails.
    pub async fn record_assessment<E>(
        &self,
        user_id: &str,
        result: &AssessmentResult,
        placement: UserStatus,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, E>
    where
        E: From<sqlx::Error> + From<AssessmentError>,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let category_scores = serde_json::to_string(&result.category_scores).unwrap_or_else(|_| "{}".into());
        let integrity_flags = serde_json::to_string(&result.integrity_flags).unwrap_or_else(|_| "[]".into());
        let growth_areas = serde_json::to_string(&result.growth_areas).unwrap_or_else(|_| "[]".into());

        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading so concurrent attempts serialize
        sqlx::query("UPDATE users SET updated_at = updated_at WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        check_attempt_allowed(user.status(), user.suspension_end_date, user.last_assessment_at, now)?;

        sqlx::query(
            r#"
            INSERT INTO assessment_attempts (id, user_id, total_score, percentage, passed, red_flag_count, category_scores, integrity_flags, growth_areas, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(i64::from(result.total_score))
        .bind(i64::from(result.percentage))
        .bind(result.passed)
        .bind(result.red_flag_count as i64)
        .bind(category_scores)
        .bind(integrity_flags)
        .bind(growth_areas)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // Any suspension still on the row has elapsed by now
        sqlx::query(
            r#"
            UPDATE users
            SET assessment_passed = ?,
                alignment_score = ?,
                last_assessment_at = ?,
                user_status = ?,
                suspension_end_date = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(result.passed)
        .bind(i64::from(result.percentage))
        .bind(now.to_rfc3339())
        .bind(placement.as_str())
        .bind(now.to_rfc3339())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(self
            .latest_attempt(user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?)
    }

    pub async fn latest_attempt(&self, user_id: &str) -> Result<Option<AssessmentAttempt>, sqlx::Error> {
        sqlx::query_as::<_, AssessmentAttempt>(
            "SELECT * FROM assessment_attempts WHERE user_id = ? ORDER BY completed_at DESC, rowid DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    // -------------------------------------------------------------------------
    // 5. Conversations
    // -------------------------------------------------------------------------

    pub async fn find_conversation(&self, id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        load_conversation(&mut conn, id).await
    }

    /// Insert a freshly opened conversation. Fails if the pair already has one.
    pub async fn create_conversation<E>(&self, conversation: &Conversation) -> Result<(), E>
    where
        E: From<sqlx::Error> + From<InteractionError>,
    {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM conversations WHERE id = ?")
            .bind(&conversation.id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(InteractionError::AlreadyExists.into());
        }

        save_conversation(&mut tx, conversation).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Atomically load, modify and store one conversation.
    ///
    /// Returns `Ok(None)` if no conversation has this id. Nothing is written
    /// when `apply` fails.
    pub async fn transition_conversation<F, T, E>(
        &self,
        id: &str,
        apply: F,
    ) -> Result<Option<(Conversation, T)>, E>
    where
        F: FnOnce(&mut Conversation) -> Result<T, E>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading so concurrent transitions serialize
        sqlx::query("UPDATE conversations SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let Some(mut conversation) = load_conversation(&mut tx, id).await? else {
            return Ok(None);
        };

        let output = apply(&mut conversation)?;
        save_conversation(&mut tx, &conversation).await?;
        tx.commit().await?;

        Ok(Some((conversation, output)))
    }

    /// Conversations the user takes part in, most recently active first.
    pub async fn conversations_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, sqlx::Error> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM conversations
            WHERE initiator_id = ? OR recipient_id = ?
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut conversations = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(conversation) = load_conversation(&mut conn, &id).await? {
                conversations.push(conversation);
            }
        }
        Ok(conversations)
    }

    /// Users who currently share unlocked photos with `user_id`.
    pub async fn unlocked_partner_ids(&self, user_id: &str) -> Result<HashSet<String>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT initiator_id, recipient_id FROM conversations
            WHERE (initiator_id = ? OR recipient_id = ?)
              AND initiator_consented = 1 AND recipient_consented = 1
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(a, b)| if a == user_id { b } else { a })
            .collect())
    }

    // -------------------------------------------------------------------------
    // 6. Reports & Support
    // -------------------------------------------------------------------------

    pub async fn create_report(
        &self,
        reporter_id: &str,
        reported_user_id: &str,
        reason: &str,
        details: &str,
    ) -> Result<Report, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO reports (id, reporter_id, reported_user_id, reason, details, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(reporter_id)
        .bind(reported_user_id)
        .bind(reason)
        .bind(details.trim())
        .bind(ReportStatus::Pending.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_report(&id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_report(&self, id: &str) -> Result<Option<Report>, sqlx::Error> {
        sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_reports(&self, status: Option<ReportStatus>) -> Result<Vec<Report>, sqlx::Error> {
        match status {
            Some(status) => {
                sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE status = ? ORDER BY created_at DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, Report>("SELECT * FROM reports ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }

    pub async fn update_report(
        &self,
        id: &str,
        status: ReportStatus,
        admin_notes: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE reports
            SET status = ?, admin_notes = COALESCE(?, admin_notes), resolved_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(admin_notes)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn create_support_message(
        &self,
        user_id: &str,
        subject: &str,
        message: &str,
    ) -> Result<SupportMessage, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO support_messages (id, user_id, subject, message, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(subject.trim())
        .bind(message.trim())
        .bind(SupportStatus::Unread.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_support_message(&id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_support_message(&self, id: &str) -> Result<Option<SupportMessage>, sqlx::Error> {
        sqlx::query_as::<_, SupportMessage>("SELECT * FROM support_messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Support tickets, optionally limited to one user.
    pub async fn list_support_messages(&self, user_id: Option<&str>) -> Result<Vec<SupportMessage>, sqlx::Error> {
        match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, SupportMessage>(
                    "SELECT * FROM support_messages WHERE user_id = ? ORDER BY created_at DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, SupportMessage>("SELECT * FROM support_messages ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }

    pub async fn update_support_message(
        &self,
        id: &str,
        status: SupportStatus,
        admin_response: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE support_messages
            SET status = ?, admin_response = COALESCE(?, admin_response), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(admin_response)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // 7. Moderation
    // -------------------------------------------------------------------------

    async fn record_moderation(
        conn: &mut SqliteConnection,
        user_id: &str,
        admin_id: &str,
        action: ModerationAction,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO moderation_records (id, user_id, admin_id, action, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(admin_id)
        .bind(action.as_str())
        .bind(reason)
        .bind(now.to_rfc3339())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn warn_user(
        &self,
        user_id: &str,
        admin_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET warning_count = warning_count + 1, updated_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        Self::record_moderation(&mut tx, user_id, admin_id, ModerationAction::Warn, reason, now).await?;
        tx.commit().await
    }

    pub async fn suspend_user(
        &self,
        user_id: &str,
        admin_id: &str,
        reason: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE users SET user_status = ?, suspension_end_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(UserStatus::Suspended.as_str())
        .bind(until.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        Self::record_moderation(&mut tx, user_id, admin_id, ModerationAction::Suspend, reason, now).await?;
        tx.commit().await
    }

    /// Permanently remove an account and revoke its identity.
    pub async fn remove_user(
        &self,
        user: &User,
        admin_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR REPLACE INTO revoked_identities (email, reason, revoked_at) VALUES (?, ?, ?)")
            .bind(normalize_email(&user.email))
            .bind(reason)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM messages WHERE conversation_id IN (
                SELECT id FROM conversations WHERE initiator_id = ? OR recipient_id = ?
            )
            "#,
        )
        .bind(&user.id)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM conversations WHERE initiator_id = ? OR recipient_id = ?")
            .bind(&user.id)
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE reports
            SET status = ?, admin_notes = COALESCE(admin_notes, 'Account removed'), resolved_at = ?
            WHERE reported_user_id = ? AND status = ?
            "#,
        )
        .bind(ReportStatus::Resolved.as_str())
        .bind(now.to_rfc3339())
        .bind(&user.id)
        .bind(ReportStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM assessment_attempts WHERE user_id = ?")
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;

        Self::record_moderation(&mut tx, &user.id, admin_id, ModerationAction::Remove, reason, now).await?;
        tx.commit().await
    }

    pub async fn moderation_history(&self, user_id: &str) -> Result<Vec<ModerationRecord>, sqlx::Error> {
        sqlx::query_as::<_, ModerationRecord>(
            "SELECT * FROM moderation_records WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    // -------------------------------------------------------------------------
    // 8. Blog
    // -------------------------------------------------------------------------

    pub async fn list_blog_posts(&self, published_only: bool) -> Result<Vec<BlogPost>, sqlx::Error> {
        let sql = if published_only {
            "SELECT * FROM blog_posts WHERE published = 1 ORDER BY published_at DESC"
        } else {
            "SELECT * FROM blog_posts ORDER BY updated_at DESC"
        };
        sqlx::query_as::<_, BlogPost>(sql).fetch_all(&self.pool).await
    }

    pub async fn find_blog_post(&self, id: &str) -> Result<Option<BlogPost>, sqlx::Error> {
        sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_blog_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, sqlx::Error> {
        sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
    }

    /// Create or update a blog post.
    pub async fn upsert_blog_post(&self, post: &BlogPost) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO blog_posts (id, title, slug, excerpt, content, author, category, tags, published, created_at, updated_at, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                slug = excluded.slug,
                excerpt = excluded.excerpt,
                content = excluded.content,
                author = excluded.author,
                category = excluded.category,
                tags = excluded.tags,
                published = excluded.published,
                updated_at = excluded.updated_at,
                published_at = excluded.published_at
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.author)
        .bind(&post.category)
        .bind(&post.tags)
        .bind(post.published)
        .bind(post.created_at.to_rfc3339())
        .bind(post.updated_at.to_rfc3339())
        .bind(post.published_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_blog_post(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // 9. Dashboard Stats
    // -------------------------------------------------------------------------

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, sqlx::Error> {
        Ok(DashboardStats {
            total_users: self.count("SELECT COUNT(*) FROM users").await?,
            active_users: self.count("SELECT COUNT(*) FROM users WHERE user_status = 'active'").await?,
            suspended_users: self.count("SELECT COUNT(*) FROM users WHERE user_status = 'suspended'").await?,
            growth_mode_users: self.count("SELECT COUNT(*) FROM users WHERE user_status = 'needs-growth'").await?,
            assessments_taken: self.count("SELECT COUNT(*) FROM assessment_attempts").await?,
            assessments_passed: self.count("SELECT COUNT(*) FROM assessment_attempts WHERE passed = 1").await?,
            pending_reports: self.count("SELECT COUNT(*) FROM reports WHERE status = 'pending'").await?,
            unread_support: self.count("SELECT COUNT(*) FROM support_messages WHERE status = 'unread'").await?,
            conversations: self.count("SELECT COUNT(*) FROM conversations").await?,
            photos_unlocked: self
                .count("SELECT COUNT(*) FROM conversations WHERE initiator_consented = 1 AND recipient_consented = 1")
                .await?,
        })
    }

    async fn count(&self, sql: &'static str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool).await
    }
}

// -----------------------------------------------------------------------------
// Conversation row mapping
// -----------------------------------------------------------------------------

async fn load_conversation(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, ConversationRow>("SELECT * FROM conversations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let messages = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, sender_id, body, kind, sent_at FROM messages
        WHERE conversation_id = ?
        ORDER BY sent_at ASC, rowid ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let messages = messages
        .into_iter()
        .map(|m| -> Result<Message, sqlx::Error> {
            let kind = m
                .kind
                .parse()
                .map_err(|e: rooted_hearts_common::ParseEnumError| sqlx::Error::Decode(Box::new(e)))?;
            Ok(Message {
                id: m.id,
                sender_id: m.sender_id,
                body: m.body,
                kind,
                sent_at: m.sent_at,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Conversation {
        id: row.id,
        initiator_id: row.initiator_id,
        recipient_id: row.recipient_id,
        messages,
        initiator_consent: PhotoConsent {
            has_consented: row.initiator_consented,
            consented_at: row.initiator_consented_at,
        },
        recipient_consent: PhotoConsent {
            has_consented: row.recipient_consented,
            consented_at: row.recipient_consented_at,
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

async fn save_conversation(
    conn: &mut SqliteConnection,
    conversation: &Conversation,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO conversations (id, initiator_id, recipient_id, initiator_consented, initiator_consented_at, recipient_consented, recipient_consented_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            initiator_consented = excluded.initiator_consented,
            initiator_consented_at = excluded.initiator_consented_at,
            recipient_consented = excluded.recipient_consented,
            recipient_consented_at = excluded.recipient_consented_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&conversation.id)
    .bind(&conversation.initiator_id)
    .bind(&conversation.recipient_id)
    .bind(conversation.initiator_consent.has_consented)
    .bind(conversation.initiator_consent.consented_at.map(|d| d.to_rfc3339()))
    .bind(conversation.recipient_consent.has_consented)
    .bind(conversation.recipient_consent.consented_at.map(|d| d.to_rfc3339()))
    .bind(conversation.created_at.to_rfc3339())
    .bind(conversation.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    // Messages are append-only
    for message in &conversation.messages {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO messages (id, conversation_id, sender_id, body, kind, sent_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&conversation.id)
        .bind(&message.sender_id)
        .bind(&message.body)
        .bind(message.kind.as_str())
        .bind(message.sent_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rooted_hearts_common::interaction::RESPONSE_MIN_CHARS;

    async fn memory_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    async fn user(db: &Database, id: &str) -> User {
        db.create_user(NewUser {
            id,
            email: &format!("{}@example.com", id),
            password_hash: "hash",
            display_name: id,
            membership_tier: MembershipTier::Monthly,
            is_admin: false,
        })
        .await
        .unwrap()
    }

    fn long() -> String {
        "Tell me more about the places you love to walk. ".repeat(3)[..RESPONSE_MIN_CHARS + 10].to_string()
    }

    #[tokio::test]
    async fn test_conversation_round_trip() {
        let db = memory_db().await;
        let now = Utc::now();
        let conversation = Conversation::open("u1", "u2", &long(), now).unwrap();
        db.create_conversation::<TestError>(&conversation).await.unwrap();

        let loaded = db.find_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.initiator_id, "u1");
        assert_eq!(loaded.messages[0].body, conversation.messages[0].body);
    }

    #[derive(Debug)]
    enum TestError {
        Db,
        Domain(InteractionError),
        Assessment(AssessmentError),
    }

    impl From<sqlx::Error> for TestError {
        fn from(_: sqlx::Error) -> Self {
            TestError::Db
        }
    }

    impl From<InteractionError> for TestError {
        fn from(e: InteractionError) -> Self {
            TestError::Domain(e)
        }
    }

    impl From<AssessmentError> for TestError {
        fn from(e: AssessmentError) -> Self {
            TestError::Assessment(e)
        }
    }

    fn perfect_result() -> AssessmentResult {
        AssessmentResult {
            total_score: 120,
            percentage: 100,
            passed: true,
            category_scores: Default::default(),
            integrity_flags: vec![],
            growth_areas: vec![],
            red_flag_count: 0,
        }
    }

    async fn attempt_count(db: &Database, user_id: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assessment_attempts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_duplicate_conversation_is_rejected() {
        let db = memory_db().await;
        let now = Utc::now();
        let first = Conversation::open("u1", "u2", &long(), now).unwrap();
        db.create_conversation::<TestError>(&first).await.unwrap();

        let reverse = Conversation::open("u2", "u1", &long(), now).unwrap();
        let err = db.create_conversation::<TestError>(&reverse).await.unwrap_err();
        assert!(matches!(err, TestError::Domain(InteractionError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_failed_transition_writes_nothing() {
        let db = memory_db().await;
        let now = Utc::now();
        let conversation = Conversation::open("u1", "u2", &long(), now).unwrap();
        db.create_conversation::<TestError>(&conversation).await.unwrap();

        let err = db
            .transition_conversation(&conversation.id, |c| {
                c.respond("u2", &long(), now)?;
                c.grant_photo_consent("u3", now)?;
                Ok::<_, TestError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Domain(InteractionError::NotParticipant(_))));

        let loaded = db.find_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);

        let missing = db
            .transition_conversation("conv_x_y", |_| Ok::<_, TestError>(()))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_consent_persists_and_unlocks() {
        let db = memory_db().await;
        let now = Utc::now();
        let conversation = Conversation::open("u1", "u2", &long(), now).unwrap();
        db.create_conversation::<TestError>(&conversation).await.unwrap();

        db.transition_conversation(&conversation.id, |c| {
            c.respond("u2", &long(), now)?;
            c.grant_photo_consent("u1", now)?;
            c.grant_photo_consent("u2", now)?;
            Ok::<_, TestError>(())
        })
        .await
        .unwrap();

        let loaded = db.find_conversation(&conversation.id).await.unwrap().unwrap();
        assert!(loaded.photos_unlocked());
        assert!(db.unlocked_partner_ids("u1").await.unwrap().contains("u2"));
        assert_eq!(db.dashboard_stats().await.unwrap().photos_unlocked, 1);
    }

    #[tokio::test]
    async fn test_remove_user_revokes_identity_and_cleans_up() {
        let db = memory_db().await;
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;
        let now = Utc::now();

        let conversation = Conversation::open(&alice.id, &bob.id, &long(), now).unwrap();
        db.create_conversation::<TestError>(&conversation).await.unwrap();
        let report = db
            .create_report(&alice.id, &bob.id, "harassment", "Sent a string of abusive messages")
            .await
            .unwrap();

        db.remove_user(&bob, "admin", "Harassment", now).await.unwrap();

        assert!(db.find_user_by_id(&bob.id).await.unwrap().is_none());
        assert!(db.is_identity_revoked("BOB@example.com").await.unwrap());
        assert!(db.find_conversation(&conversation.id).await.unwrap().is_none());
        let report = db.find_report(&report.id).await.unwrap().unwrap();
        assert_eq!(report.report_status(), ReportStatus::Resolved);
        assert_eq!(db.moderation_history(&bob.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assessment_rejected_during_suspension() {
        let db = memory_db().await;
        let member = user(&db, "carol").await;
        let now = Utc::now();
        let until = now + chrono::Duration::days(1);
        db.suspend_user(&member.id, "admin", "Spam", until, now).await.unwrap();

        let err = db
            .record_assessment::<TestError>(&member.id, &perfect_result(), UserStatus::Active, now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TestError::Assessment(AssessmentError::Suspended { until: Some(end) }) if end == until
        ));
        assert_eq!(attempt_count(&db, &member.id).await, 0);

        // After expiry the member can qualify again straight away
        let later = now + chrono::Duration::days(2);
        let stored = db.load_user(&member.id, later).await.unwrap().unwrap();
        assert_eq!(stored.status(), UserStatus::NeedsGrowth);
        assert!(check_attempt_allowed(
            stored.status(),
            stored.suspension_end_date,
            stored.last_assessment_at,
            later
        )
        .is_ok());

        let attempt = db
            .record_assessment::<TestError>(&member.id, &perfect_result(), UserStatus::Active, later)
            .await
            .unwrap();
        assert_eq!(attempt.to_result(), perfect_result());
        let stored = db.load_user(&member.id, later).await.unwrap().unwrap();
        assert_eq!(stored.status(), UserStatus::Active);
        assert!(stored.assessment_passed);
    }

    #[tokio::test]
    async fn test_concurrent_attempts_respect_cooldown() {
        let db = memory_db().await;
        let member = user(&db, "erin").await;
        let now = Utc::now();
        let result = perfect_result();

        let (first, second) = tokio::join!(
            db.record_assessment::<TestError>(&member.id, &result, UserStatus::Active, now),
            db.record_assessment::<TestError>(&member.id, &result, UserStatus::Active, now),
        );

        let locked = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(TestError::Assessment(AssessmentError::RetakeLocked { .. }))))
            .count();
        assert!(first.is_ok() || second.is_ok());
        assert_eq!(locked, 1);
        assert_eq!(attempt_count(&db, &member.id).await, 1);
    }

    #[tokio::test]
    async fn test_elapsed_suspension_is_normalised_on_load() {
        let db = memory_db().await;
        let member = user(&db, "dana").await;
        let then = Utc::now() - chrono::Duration::days(400);
        let until = then + chrono::Duration::days(180);
        db.suspend_user(&member.id, "admin", "Spam", until, then).await.unwrap();

        let loaded = db.load_user(&member.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), UserStatus::NeedsGrowth);
        assert!(loaded.suspension_end_date.is_none());
    }
}
