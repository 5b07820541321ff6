use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::import::identity::{EducationKey, ExperienceKey, ProjectKey, SkillKey};
use crate::models::profile::{
    EducationRow, ExperienceRow, NewEducation, NewExperience, NewProject, NewSkill,
    ProfileSnapshot, ProjectRow, SkillRow, UserRow, UserUpdate,
};
use crate::store::{ProfileStore, ProfileTx, StoreError};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn begin(&self, owner: Uuid) -> Result<Box<dyn ProfileTx>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Per-owner lock, released automatically at commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(owner.to_string())
            .execute(&mut *tx)
            .await?;

        debug!(%owner, "postgres transaction opened");
        Ok(Box::new(PgProfileTx { tx, owner }))
    }

    async fn load_profile(&self, owner: Uuid) -> Result<ProfileSnapshot, StoreError> {
        let user: Option<UserRow> =
            sqlx::query_as("SELECT id, name, bio FROM users WHERE id = $1")
                .bind(owner)
                .fetch_optional(&self.pool)
                .await?;
        let user = user.ok_or(StoreError::OwnerNotFound(owner))?;

        let experiences = sqlx::query_as::<_, ExperienceRow>(
            r#"
            SELECT id, user_id, company, title, description, start_date, end_date,
                   current, location, created_at
            FROM experiences
            WHERE user_id = $1
            ORDER BY start_date DESC, created_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let educations = sqlx::query_as::<_, EducationRow>(
            r#"
            SELECT id, user_id, institution, degree, field, start_date, end_date, gpa, created_at
            FROM educations
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let skills = sqlx::query_as::<_, SkillRow>(
            "SELECT id, user_id, name, category, created_at FROM skills WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let projects = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, user_id, name, description, technologies, url, start_date, end_date, created_at
            FROM projects
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(ProfileSnapshot {
            name: user.name,
            bio: user.bio,
            experiences,
            educations,
            skills,
            projects,
        })
    }
}

pub struct PgProfileTx {
    tx: Transaction<'static, Postgres>,
    owner: Uuid,
}

/// Unique-key violations become `Conflict`; everything else stays a
/// database error.
fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl ProfileTx for PgProfileTx {
    fn owner(&self) -> Uuid {
        self.owner
    }

    async fn update_user(&mut self, update: &UserUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET name = COALESCE($2, name), bio = COALESCE($3, bio) WHERE id = $1",
        )
        .bind(self.owner)
        .bind(update.name.as_deref())
        .bind(update.bio.as_deref())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OwnerNotFound(self.owner));
        }
        Ok(())
    }

    async fn find_experience(&mut self, key: &ExperienceKey) -> Result<Option<Uuid>, StoreError> {
        let found: Option<Uuid> = match key {
            ExperienceKey::Dated {
                company,
                title,
                start_date,
            } => {
                sqlx::query_scalar(
                    r#"
                    SELECT id FROM experiences
                    WHERE user_id = $1 AND company = $2 AND title = $3 AND start_date = $4
                    LIMIT 1
                    "#,
                )
                .bind(self.owner)
                .bind(company)
                .bind(title)
                .bind(start_date)
                .fetch_optional(&mut *self.tx)
                .await?
            }
            ExperienceKey::Undated {
                company,
                title,
                description,
            } => {
                sqlx::query_scalar(
                    r#"
                    SELECT id FROM experiences
                    WHERE user_id = $1 AND company = $2 AND title = $3 AND description = $4
                    LIMIT 1
                    "#,
                )
                .bind(self.owner)
                .bind(company)
                .bind(title)
                .bind(description)
                .fetch_optional(&mut *self.tx)
                .await?
            }
        };
        Ok(found)
    }

    async fn insert_experience(&mut self, row: &NewExperience) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO experiences
                (id, user_id, company, title, description, start_date, end_date, current, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(self.owner)
        .bind(&row.company)
        .bind(&row.title)
        .bind(&row.description)
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.current)
        .bind(row.location.as_deref())
        .execute(&mut *self.tx)
        .await
        .map_err(map_insert_error)?;
        Ok(id)
    }

    async fn find_education(&mut self, key: &EducationKey) -> Result<Option<Uuid>, StoreError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT id FROM educations
            WHERE user_id = $1 AND institution = $2 AND degree = $3 AND field = $4
            LIMIT 1
            "#,
        )
        .bind(self.owner)
        .bind(&key.institution)
        .bind(&key.degree)
        .bind(&key.field)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn insert_education(&mut self, row: &NewEducation) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO educations
                (id, user_id, institution, degree, field, start_date, end_date, gpa)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(self.owner)
        .bind(&row.institution)
        .bind(&row.degree)
        .bind(&row.field)
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.gpa)
        .execute(&mut *self.tx)
        .await
        .map_err(map_insert_error)?;
        Ok(id)
    }

    async fn find_skill(&mut self, key: &SkillKey) -> Result<Option<Uuid>, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT id FROM skills WHERE user_id = $1 AND name = $2")
                .bind(self.owner)
                .bind(&key.0)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn insert_skill(&mut self, row: &NewSkill) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO skills (id, user_id, name, category) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(self.owner)
            .bind(&row.name)
            .bind(&row.category)
            .execute(&mut *self.tx)
            .await
            .map_err(map_insert_error)?;
        Ok(id)
    }

    async fn find_project(&mut self, key: &ProjectKey) -> Result<Option<Uuid>, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT id FROM projects WHERE user_id = $1 AND name = $2 LIMIT 1",
        )
        .bind(self.owner)
        .bind(&key.0)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn insert_project(&mut self, row: &NewProject) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO projects
                (id, user_id, name, description, technologies, url, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(self.owner)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.technologies)
        .bind(row.url.as_deref())
        .bind(row.start_date)
        .bind(row.end_date)
        .execute(&mut *self.tx)
        .await
        .map_err(map_insert_error)?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let owner = self.owner;
        self.tx.commit().await?;
        info!(%owner, "profile transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let owner = self.owner;
        self.tx.rollback().await?;
        debug!(%owner, "profile transaction rolled back");
        Ok(())
    }
}
