// Postgres store variant. The pool is created once in main from config
// and injected here; exhaustion queues acquires until the configured
// timeout instead of failing fast.
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::store::{
    apply_patch, materialize, CredentialStore, NewCredential, StoreError, StudentStore,
    STUDENT_NOT_FOUND,
};
use crate::types::{
    Assignment, Course, Credential, NewStudent, Student, StudentFilters, StudentPatch,
    StudentStatus,
};

pub async fn connect(cfg: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let url = cfg
        .url
        .as_deref()
        .ok_or_else(|| StoreError::Connection("DATABASE_URL not configured".to_string()))?;

    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .connect(url)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))
}

pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Query(format!("migration failed: {}", e)))
}

pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const STUDENT_COLUMNS: &str = "id, first_name, last_name, email, student_id, date_of_birth, \
     enrollment_date, grade, status, phone_number, address, guardian_info, academic_info, \
     created_at, updated_at";

fn push_filters(qb: &mut QueryBuilder<Postgres>, filters: &StudentFilters) {
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR student_id ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = &filters.status {
        qb.push(" AND status = ").push_bind(status.clone());
    }
    if let Some(grade) = &filters.grade {
        qb.push(" AND grade = ").push_bind(grade.clone());
    }
    if let Some(start) = filters.start_date {
        qb.push(" AND enrollment_date >= ").push_bind(start);
    }
    if let Some(end) = filters.end_date {
        qb.push(" AND enrollment_date <= ").push_bind(end);
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn decode_json<T: DeserializeOwned>(
    value: Option<JsonValue>,
    column: &str,
) -> Result<Option<T>, StoreError> {
    value
        .map(|v| {
            serde_json::from_value(v)
                .map_err(|e| StoreError::Query(format!("bad {} json: {}", column, e)))
        })
        .transpose()
}

fn encode_json<T: serde::Serialize>(
    value: &Option<T>,
    column: &str,
) -> Result<Option<JsonValue>, StoreError> {
    value
        .as_ref()
        .map(|v| {
            serde_json::to_value(v)
                .map_err(|e| StoreError::Query(format!("cannot encode {}: {}", column, e)))
        })
        .transpose()
}

fn student_from_row(row: &PgRow) -> Result<Student, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let status = StudentStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Query(format!("unknown status value: {}", status_raw)))?;

    Ok(Student {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        student_id: row.try_get("student_id")?,
        date_of_birth: row.try_get("date_of_birth")?,
        enrollment_date: row.try_get("enrollment_date")?,
        grade: row.try_get("grade")?,
        status,
        phone_number: row.try_get("phone_number")?,
        address: decode_json(row.try_get("address")?, "address")?,
        guardian_info: decode_json(row.try_get("guardian_info")?, "guardian_info")?,
        academic_info: decode_json(row.try_get("academic_info")?, "academic_info")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PgStudentStore {
    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn write_row(&self, student: &Student, insert: bool) -> Result<(), StoreError> {
        let address = encode_json(&student.address, "address")?;
        let guardian = encode_json(&student.guardian_info, "guardian_info")?;
        let academic = encode_json(&student.academic_info, "academic_info")?;

        let sql = if insert {
            "INSERT INTO students (id, first_name, last_name, email, student_id, date_of_birth, \
             enrollment_date, grade, status, phone_number, address, guardian_info, academic_info, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        } else {
            "UPDATE students SET first_name = $2, last_name = $3, email = $4, student_id = $5, \
             date_of_birth = $6, enrollment_date = $7, grade = $8, status = $9, phone_number = $10, \
             address = $11, guardian_info = $12, academic_info = $13, created_at = $14, \
             updated_at = $15 WHERE id = $1"
        };

        sqlx::query(sql)
            .bind(student.id)
            .bind(&student.first_name)
            .bind(&student.last_name)
            .bind(&student.email)
            .bind(&student.student_id)
            .bind(student.date_of_birth)
            .bind(student.enrollment_date)
            .bind(&student.grade)
            .bind(student.status.as_str())
            .bind(&student.phone_number)
            .bind(address)
            .bind(guardian)
            .bind(academic)
            .bind(student.created_at)
            .bind(student.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn list(
        &self,
        page: i64,
        limit: i64,
        filters: &StudentFilters,
    ) -> Result<(Vec<Student>, i64), StoreError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM students WHERE TRUE");
        push_filters(&mut count_qb, filters);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb =
            QueryBuilder::new(format!("SELECT {} FROM students WHERE TRUE", STUDENT_COLUMNS));
        push_filters(&mut qb, filters);
        qb.push(" ORDER BY created_at, id LIMIT ")
            .push_bind(limit.max(0))
            .push(" OFFSET ")
            .push_bind((page - 1).saturating_mul(limit).max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        let students = rows.iter().map(student_from_row).collect::<Result<_, _>>()?;
        Ok((students, total))
    }

    async fn get(&self, id: Uuid) -> Result<Student, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM students WHERE id = $1",
            STUDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(STUDENT_NOT_FOUND.to_string()))?;
        student_from_row(&row)
    }

    async fn create(&self, new: &NewStudent) -> Result<Student, StoreError> {
        let student = materialize(new);
        self.write_row(&student, true).await?;
        Ok(student)
    }

    async fn update(&self, id: Uuid, patch: &StudentPatch) -> Result<Student, StoreError> {
        // Fetch-merge-write; deliberately last-write-wins, no version check
        let mut student = self.get(id).await?;
        apply_patch(&mut student, patch);
        self.write_row(&student, false).await?;
        Ok(student)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(STUDENT_NOT_FOUND.to_string()));
        }
        Ok(())
    }

    async fn find_all(&self, filters: &StudentFilters) -> Result<Vec<Student>, StoreError> {
        let mut qb =
            QueryBuilder::new(format!("SELECT {} FROM students WHERE TRUE", STUDENT_COLUMNS));
        push_filters(&mut qb, filters);
        qb.push(" ORDER BY created_at, id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(student_from_row).collect()
    }

    async fn courses(&self, student_id: Uuid) -> Result<Vec<Course>, StoreError> {
        if !self.exists(student_id).await? {
            return Err(StoreError::NotFound(STUDENT_NOT_FOUND.to_string()));
        }

        let rows = sqlx::query(
            "SELECT id, name, description, credits, instructor, schedule, grade, progress \
             FROM student_courses WHERE student_id = $1 ORDER BY name",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let schedule = decode_json(row.try_get("schedule")?, "schedule")?
                    .ok_or_else(|| StoreError::Query("course schedule is null".to_string()))?;
                Ok(Course {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    credits: row.try_get("credits")?,
                    instructor: row.try_get("instructor")?,
                    schedule,
                    grade: row.try_get("grade")?,
                    progress: row.try_get("progress")?,
                })
            })
            .collect()
    }

    async fn assignments(&self, student_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        if !self.exists(student_id).await? {
            return Err(StoreError::NotFound(STUDENT_NOT_FOUND.to_string()));
        }

        let rows = sqlx::query(
            "SELECT id, course_id, title, description, due_date, total_points, status, grade, \
             submitted FROM student_assignments WHERE student_id = $1 ORDER BY due_date, id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Assignment {
                    id: row.try_get("id")?,
                    course_id: row.try_get("course_id")?,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    due_date: row.try_get("due_date")?,
                    total_points: row.try_get("total_points")?,
                    status: row.try_get("status")?,
                    grade: row.try_get("grade")?,
                    submitted: row.try_get("submitted")?,
                })
            })
            .collect()
    }
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn credential_from_row(row: &PgRow) -> Result<Credential, StoreError> {
    Ok(Credential {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        remember_me: row.try_get("remember_me")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: row.try_get("role")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, remember_me, first_name, last_name, role, \
             created_at, updated_at FROM credentials WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(credential_from_row).transpose()
    }

    async fn insert(&self, new: &NewCredential) -> Result<Credential, StoreError> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let result = sqlx::query(
            "INSERT INTO credentials (id, email, password_hash, remember_me, first_name, \
             last_name, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.remember_me)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.role)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Credential {
                id,
                email: new.email.clone(),
                password_hash: new.password_hash.clone(),
                remember_me: new.remember_me,
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                role: new.role.clone(),
                created_at: now,
                updated_at: now,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::Duplicate(format!("credential already exists for {}", new.email)),
            ),
            Err(e) => Err(e.into()),
        }
    }
}
