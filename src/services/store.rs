use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use thiserror::Error;
use tracing::debug;

use crate::config::DatabaseSettings;
use crate::core::version;
use crate::models::{
    LikeRow, MatchingRecord, Pet, PetPicture, PetSummary, PetWithImages, PictureSummary, Rating,
    User,
};

/// Failures surfaced by the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl StoreError {
    /// True when the failure is lock contention worth retrying.
    pub fn is_busy(&self) -> bool {
        match self {
            StoreError::Sqlx(sqlx::Error::Database(e)) => {
                let message = e.message().to_lowercase();
                message.contains("locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}

fn is_fk_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::ForeignKeyViolation
    )
}

/// SQLite-backed store for users, pets, pictures and the rating ledger.
///
/// Timestamps are persisted as integer unix milliseconds so that version
/// comparisons in SQL stay exact.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let connect = SqliteConnectOptions::from_str(&settings.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.unwrap_or(10))
            .min_connections(settings.min_connections.unwrap_or(1))
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)))
            .idle_timeout(Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)))
            .test_before_acquire(true)
            .connect_with(connect)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("Database ready at {}", settings.url);

        Ok(Self { pool })
    }

    /// A private in-memory database, one connection so every query sees
    /// the same data.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let connect = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    // ---- users ----

    pub async fn create_user(&self, display_name: Option<&str>) -> Result<User, StoreError> {
        let now = version::to_millis(version::now());
        let row = sqlx::query(
            "INSERT INTO users (display_name, active, created_at) VALUES (?, 1, ?)
             RETURNING id, display_name, active, premium_expiration, created_at",
        )
        .bind(display_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let user = user_from_row(&row)?;
        debug!("Created user {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, display_name, active, premium_expiration, created_at
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, display_name, active, premium_expiration, created_at
             FROM users WHERE id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        builder.push(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    pub async fn set_user_active(&self, user_id: i64, active: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET active = ? WHERE id = ?")
            .bind(active)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }

        debug!("User {} active = {}", user_id, active);
        Ok(())
    }

    // ---- pets ----

    pub async fn create_pet(&self, owner_id: i64, name: &str) -> Result<Pet, StoreError> {
        let now = version::to_millis(version::now());
        let row = sqlx::query(
            "INSERT INTO pets (user_id, name, active, created_at) VALUES (?, ?, 1, ?)
             RETURNING id, user_id, name, description, profile_picture_id, active,
                       created_at, modified_at",
        )
        .bind(owner_id)
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_fk_violation(&e) {
                StoreError::InvalidReference(format!("owner {} does not exist", owner_id))
            } else {
                StoreError::Sqlx(e)
            }
        })?;

        let pet = pet_from_row(&row)?;
        debug!("Created pet {} for user {}", pet.id, owner_id);
        Ok(pet)
    }

    pub async fn get_pet(&self, pet_id: i64) -> Result<Option<Pet>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, description, profile_picture_id, active,
                    created_at, modified_at
             FROM pets WHERE id = ?",
        )
        .bind(pet_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(pet_from_row).transpose()
    }

    pub async fn get_pet_with_owner(
        &self,
        pet_id: i64,
    ) -> Result<Option<(Pet, User)>, StoreError> {
        let row = sqlx::query(
            "SELECT p.id, p.user_id, p.name, p.description, p.profile_picture_id, p.active,
                    p.created_at, p.modified_at,
                    u.id AS owner_id, u.display_name AS owner_name, u.active AS owner_active,
                    u.premium_expiration AS owner_premium_expiration,
                    u.created_at AS owner_created_at
             FROM pets p
             JOIN users u ON u.id = p.user_id
             WHERE p.id = ?",
        )
        .bind(pet_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let pet = pet_from_row(&row)?;
                let owner = User {
                    id: row.get("owner_id"),
                    display_name: row.get("owner_name"),
                    active: row.get("owner_active"),
                    premium_expiration: dt_opt(row.get("owner_premium_expiration"))?,
                    created_at: dt(row.get("owner_created_at"))?,
                };
                Ok(Some((pet, owner)))
            }
            None => Ok(None),
        }
    }

    /// A pet with its profile picture URL and its live picture list.
    pub async fn get_pet_detail(&self, pet_id: i64) -> Result<Option<PetWithImages>, StoreError> {
        let row = sqlx::query(
            "SELECT p.id, p.user_id, p.name, p.description, p.profile_picture_id, p.active,
                    p.created_at, p.modified_at, pp.url AS profile_image_url
             FROM pets p
             LEFT JOIN pet_pictures pp ON pp.id = p.profile_picture_id
             WHERE p.id = ?",
        )
        .bind(pet_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let pet = pet_from_row(&row)?;
        let profile_image_url: Option<String> = row.get("profile_image_url");

        let image_rows = sqlx::query(
            "SELECT id, url, created_at FROM pet_pictures
             WHERE pet_id = ? AND active = 1 AND removed = 0
             ORDER BY id",
        )
        .bind(pet_id)
        .fetch_all(&self.pool)
        .await?;

        let images = image_rows
            .iter()
            .map(|row| {
                Ok(PictureSummary {
                    id: row.get("id"),
                    url: row.get("url"),
                    created_ts: dt(row.get("created_at"))?.timestamp(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(PetWithImages {
            pet,
            profile_image_url,
            images,
        }))
    }

    /// Every pet the user owns, hidden ones included. Match evidence may
    /// reference pets their owner later deactivated.
    pub async fn pet_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query("SELECT id FROM pets WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// Apply a partial edit and advance the pet's version watermark.
    ///
    /// The watermark moves strictly past the previous version even when
    /// several edits land within one millisecond, so an edited pet always
    /// re-enters feeds that already rated it.
    pub async fn update_pet(
        &self,
        pet_id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Pet, StoreError> {
        let now = version::to_millis(version::now());
        let row = sqlx::query(
            "UPDATE pets
             SET name = COALESCE(?1, name),
                 description = COALESCE(?2, description),
                 modified_at = MAX(?3, COALESCE(modified_at, created_at) + 1)
             WHERE id = ?4
             RETURNING id, user_id, name, description, profile_picture_id, active,
                       created_at, modified_at",
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(pet_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| StoreError::NotFound(format!("pet {}", pet_id)))?;
        let pet = pet_from_row(&row)?;
        debug!("Updated pet {}, version {}", pet.id, pet.version());
        Ok(pet)
    }

    /// Hiding a pet does not advance its version; a reactivated pet keeps
    /// its rating history.
    pub async fn set_pet_active(&self, pet_id: i64, active: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE pets SET active = ? WHERE id = ?")
            .bind(active)
            .bind(pet_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("pet {}", pet_id)));
        }

        debug!("Pet {} active = {}", pet_id, active);
        Ok(())
    }

    pub async fn delete_pet(&self, pet_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM pets WHERE id = ?")
            .bind(pet_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("pet {}", pet_id)));
        }

        debug!("Deleted pet {} and its dependents", pet_id);
        Ok(())
    }

    // ---- pictures ----

    pub async fn add_picture(&self, pet_id: i64, url: &str) -> Result<PetPicture, StoreError> {
        let now = version::to_millis(version::now());
        let row = sqlx::query(
            "INSERT INTO pet_pictures (pet_id, url, active, removed, created_at)
             VALUES (?, ?, 1, 0, ?)
             RETURNING id, pet_id, url, active, removed, created_at",
        )
        .bind(pet_id)
        .bind(url)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_fk_violation(&e) {
                StoreError::InvalidReference(format!("pet {} does not exist", pet_id))
            } else {
                StoreError::Sqlx(e)
            }
        })?;

        let picture = picture_from_row(&row)?;
        debug!("Added picture {} to pet {}", picture.id, pet_id);
        Ok(picture)
    }

    /// Point a pet at one of its own pictures.
    ///
    /// The picture must belong to the pet and must not be removed.
    /// Changing the profile picture does not advance the pet's version.
    pub async fn set_profile_picture(
        &self,
        pet_id: i64,
        picture_id: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE pets SET profile_picture_id = ?2
             WHERE id = ?1
               AND EXISTS (SELECT 1 FROM pet_pictures
                           WHERE id = ?2 AND pet_id = ?1 AND removed = 0)",
        )
        .bind(pet_id)
        .bind(picture_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Tell a missing pet apart from a picture that is not the pet's.
            if self.get_pet(pet_id).await?.is_none() {
                return Err(StoreError::NotFound(format!("pet {}", pet_id)));
            }
            return Err(StoreError::InvalidReference(format!(
                "picture {} does not belong to pet {}",
                picture_id, pet_id
            )));
        }

        debug!("Pet {} profile picture = {}", pet_id, picture_id);
        Ok(())
    }

    /// Soft-remove a picture and clear any profile reference to it.
    pub async fn mark_picture_removed(&self, picture_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE pets SET profile_picture_id = NULL WHERE profile_picture_id = ?")
            .bind(picture_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("UPDATE pet_pictures SET removed = 1 WHERE id = ?")
            .bind(picture_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound(format!("picture {}", picture_id)));
        }

        tx.commit().await?;
        debug!("Removed picture {}", picture_id);
        Ok(())
    }

    /// Hard-delete a picture row. Any pet pointing at it as a profile
    /// picture loses the reference (the schema sets it to NULL on delete).
    pub async fn delete_picture(&self, picture_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM pet_pictures WHERE id = ?")
            .bind(picture_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("picture {}", picture_id)));
        }

        debug!("Deleted picture {}", picture_id);
        Ok(())
    }

    // ---- rating ledger ----

    /// Insert or rewrite the caller's rating of one pet version.
    ///
    /// The ledger is keyed by (user, pet, version): repeating a rating of
    /// the same version rewrites that record in place and stamps
    /// modified_at, while rating after the pet changed starts a fresh
    /// record and leaves the old one as history.
    pub async fn upsert_rating(
        &self,
        user_id: i64,
        pet_id: i64,
        pet_version_time: DateTime<Utc>,
        rating: Rating,
    ) -> Result<MatchingRecord, StoreError> {
        let now = version::to_millis(version::now());
        let row = sqlx::query(
            "INSERT INTO matching_records
                 (user_id, pet_id, pet_version_time, rating, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, NULL)
             ON CONFLICT(user_id, pet_id, pet_version_time)
             DO UPDATE SET rating = excluded.rating, modified_at = excluded.created_at
             RETURNING id, user_id, pet_id, pet_version_time, rating, created_at, modified_at",
        )
        .bind(user_id)
        .bind(pet_id)
        .bind(version::to_millis(pet_version_time))
        .bind(i64::from(rating))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_fk_violation(&e) {
                StoreError::InvalidReference(format!(
                    "user {} or pet {} does not exist",
                    user_id, pet_id
                ))
            } else {
                StoreError::Sqlx(e)
            }
        })?;

        record_from_row(&row)
    }

    /// One user's full rating history for one pet, oldest version first.
    pub async fn list_ratings(
        &self,
        user_id: i64,
        pet_id: i64,
    ) -> Result<Vec<MatchingRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, pet_id, pet_version_time, rating, created_at, modified_at
             FROM matching_records
             WHERE user_id = ? AND pet_id = ?
             ORDER BY pet_version_time",
        )
        .bind(user_id)
        .bind(pet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Pets eligible for one user's feed, in storage order.
    ///
    /// A pet qualifies when it is active, belongs to someone else, and
    /// the user holds no rating stamped at or past its current version.
    /// Pets edited after a rating fall back in.
    pub async fn feed_candidates(
        &self,
        user_id: i64,
        limit: u16,
    ) -> Result<Vec<PetSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT p.id, p.name, p.user_id AS owner_id, p.description,
                    p.profile_picture_id AS profile_image_id, pp.url AS profile_image_url
             FROM pets p
             LEFT JOIN pet_pictures pp ON pp.id = p.profile_picture_id
             WHERE p.active = 1
               AND p.user_id <> ?1
               AND NOT EXISTS (
                   SELECT 1 FROM matching_records mr
                   WHERE mr.user_id = ?1
                     AND mr.pet_id = p.id
                     AND mr.pet_version_time >= COALESCE(p.modified_at, p.created_at)
               )
             LIMIT ?2",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut pets: Vec<PetSummary> = rows
            .iter()
            .map(|row| PetSummary {
                id: row.get("id"),
                name: row.get("name"),
                owner_id: row.get("owner_id"),
                description: row.get("description"),
                profile_image_id: row.get("profile_image_id"),
                profile_image_url: row
                    .get::<Option<String>, _>("profile_image_url")
                    .unwrap_or_default(),
                images: Vec::new(),
            })
            .collect();

        if pets.is_empty() {
            return Ok(pets);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, pet_id, url, created_at FROM pet_pictures
             WHERE active = 1 AND removed = 0 AND pet_id IN (",
        );
        let mut separated = builder.separated(", ");
        for pet in &pets {
            separated.push_bind(pet.id);
        }
        builder.push(") ORDER BY pet_id, id");

        let image_rows = builder.build().fetch_all(&self.pool).await?;
        let mut by_pet: HashMap<i64, Vec<PictureSummary>> = HashMap::new();
        for row in &image_rows {
            let pet_id: i64 = row.get("pet_id");
            by_pet.entry(pet_id).or_default().push(PictureSummary {
                id: row.get("id"),
                url: row.get("url"),
                created_ts: dt(row.get("created_at"))?.timestamp(),
            });
        }

        for pet in &mut pets {
            if let Some(images) = by_pet.remove(&pet.id) {
                pet.images = images;
            }
        }

        Ok(pets)
    }

    /// Every like that can take part in one of this user's matches: likes
    /// the user gave, plus likes anyone gave the user's pets.
    pub async fn relevant_likes(
        &self,
        user_id: i64,
        my_pet_ids: &[i64],
    ) -> Result<Vec<LikeRow>, StoreError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT mr.user_id AS rater_id, mr.pet_id, mr.created_at,
                    p.user_id AS pet_owner_id, p.name AS pet_name,
                    p.description AS pet_description,
                    p.profile_picture_id AS profile_image_id,
                    pp.url AS profile_image_url
             FROM matching_records mr
             JOIN pets p ON p.id = mr.pet_id
             LEFT JOIN pet_pictures pp ON pp.id = p.profile_picture_id
             WHERE mr.rating = 1 AND (mr.user_id = ",
        );
        builder.push_bind(user_id);

        if !my_pet_ids.is_empty() {
            builder.push(" OR mr.pet_id IN (");
            let mut separated = builder.separated(", ");
            for id in my_pet_ids {
                separated.push_bind(*id);
            }
            builder.push(")");
        }
        builder.push(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(like_from_row).collect()
    }
}

// ---- row mapping ----

fn dt(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    version::from_millis(ms)
        .ok_or_else(|| StoreError::InvalidRow(format!("timestamp out of range: {}", ms)))
}

fn dt_opt(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StoreError> {
    ms.map(dt).transpose()
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.get("id"),
        display_name: row.get("display_name"),
        active: row.get("active"),
        premium_expiration: dt_opt(row.get("premium_expiration"))?,
        created_at: dt(row.get("created_at"))?,
    })
}

fn pet_from_row(row: &SqliteRow) -> Result<Pet, StoreError> {
    Ok(Pet {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        profile_picture_id: row.get("profile_picture_id"),
        active: row.get("active"),
        created_at: dt(row.get("created_at"))?,
        modified_at: dt_opt(row.get("modified_at"))?,
    })
}

fn picture_from_row(row: &SqliteRow) -> Result<PetPicture, StoreError> {
    Ok(PetPicture {
        id: row.get("id"),
        pet_id: row.get("pet_id"),
        url: row.get("url"),
        active: row.get("active"),
        removed: row.get("removed"),
        created_at: dt(row.get("created_at"))?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<MatchingRecord, StoreError> {
    let rating = Rating::try_from(row.get::<i64, _>("rating"))
        .map_err(|e| StoreError::InvalidRow(e.to_string()))?;

    Ok(MatchingRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        pet_id: row.get("pet_id"),
        pet_version_time: dt(row.get("pet_version_time"))?,
        rating,
        created_at: dt(row.get("created_at"))?,
        modified_at: dt_opt(row.get("modified_at"))?,
    })
}

fn like_from_row(row: &SqliteRow) -> Result<LikeRow, StoreError> {
    Ok(LikeRow {
        rater_id: row.get("rater_id"),
        pet_id: row.get("pet_id"),
        pet_owner_id: row.get("pet_owner_id"),
        pet_name: row.get("pet_name"),
        pet_description: row.get("pet_description"),
        profile_image_id: row.get("profile_image_id"),
        profile_image_url: row.get("profile_image_url"),
        created_at: dt(row.get("created_at"))?,
    })
}
