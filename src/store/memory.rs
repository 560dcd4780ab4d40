// In-memory store variant. Backs the dev server when no DATABASE_URL is
// configured, and the integration test suite.
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{
    apply_patch, matches_filters, materialize, CredentialStore, NewCredential, StoreError,
    StudentStore, STUDENT_NOT_FOUND,
};
use crate::types::{
    Assignment, Course, Credential, NewStudent, Student, StudentFilters, StudentPatch,
};

#[derive(Default)]
pub struct MemoryStudentStore {
    students: RwLock<HashMap<Uuid, Student>>,
    courses: RwLock<HashMap<Uuid, Vec<Course>>>,
    assignments: RwLock<HashMap<Uuid, Vec<Assignment>>>,
}

impl MemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach course rows to a student (dev seeding and tests).
    pub async fn put_courses(&self, student_id: Uuid, courses: Vec<Course>) {
        self.courses.write().await.insert(student_id, courses);
    }

    pub async fn put_assignments(&self, student_id: Uuid, assignments: Vec<Assignment>) {
        self.assignments.write().await.insert(student_id, assignments);
    }

    /// Filtered set in stable order: createdAt, then id as tiebreak.
    async fn filtered(&self, filters: &StudentFilters) -> Vec<Student> {
        let students = self.students.read().await;
        let mut matched: Vec<Student> = students
            .values()
            .filter(|s| matches_filters(s, filters))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matched
    }
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn list(
        &self,
        page: i64,
        limit: i64,
        filters: &StudentFilters,
    ) -> Result<(Vec<Student>, i64), StoreError> {
        let matched = self.filtered(filters).await;
        let total = matched.len() as i64;

        // Saturate so an absurd page number yields an empty page, not a panic
        let start = (page - 1).saturating_mul(limit).max(0) as usize;
        let items = matched
            .into_iter()
            .skip(start)
            .take(limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }

    async fn get(&self, id: Uuid) -> Result<Student, StoreError> {
        self.students
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(STUDENT_NOT_FOUND.to_string()))
    }

    async fn create(&self, new: &NewStudent) -> Result<Student, StoreError> {
        let student = materialize(new);
        self.students
            .write()
            .await
            .insert(student.id, student.clone());
        Ok(student)
    }

    async fn update(&self, id: Uuid, patch: &StudentPatch) -> Result<Student, StoreError> {
        let mut students = self.students.write().await;
        let student = students
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(STUDENT_NOT_FOUND.to_string()))?;
        apply_patch(student, patch);
        Ok(student.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let removed = self.students.write().await.remove(&id);
        if removed.is_none() {
            return Err(StoreError::NotFound(STUDENT_NOT_FOUND.to_string()));
        }
        self.courses.write().await.remove(&id);
        self.assignments.write().await.remove(&id);
        Ok(())
    }

    async fn find_all(&self, filters: &StudentFilters) -> Result<Vec<Student>, StoreError> {
        Ok(self.filtered(filters).await)
    }

    async fn courses(&self, student_id: Uuid) -> Result<Vec<Course>, StoreError> {
        if !self.students.read().await.contains_key(&student_id) {
            return Err(StoreError::NotFound(STUDENT_NOT_FOUND.to_string()));
        }
        Ok(self
            .courses
            .read()
            .await
            .get(&student_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn assignments(&self, student_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        if !self.students.read().await.contains_key(&student_id) {
            return Err(StoreError::NotFound(STUDENT_NOT_FOUND.to_string()));
        }
        Ok(self
            .assignments
            .read()
            .await
            .get(&student_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<Vec<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let needle = email.to_lowercase();
        Ok(self
            .credentials
            .read()
            .await
            .iter()
            .find(|c| c.email.to_lowercase() == needle)
            .cloned())
    }

    async fn insert(&self, new: &NewCredential) -> Result<Credential, StoreError> {
        let mut credentials = self.credentials.write().await;
        let needle = new.email.to_lowercase();
        if credentials.iter().any(|c| c.email.to_lowercase() == needle) {
            return Err(StoreError::Duplicate(format!(
                "credential already exists for {}",
                new.email
            )));
        }

        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            remember_me: new.remember_me,
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            role: new.role.clone(),
            created_at: now,
            updated_at: now,
        };
        credentials.push(credential.clone());
        Ok(credential)
    }
}
