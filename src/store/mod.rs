// Store seam for students and credentials. Two implementations exist:
// an in-memory one (dev/mock variant, tests) and a postgres one. The
// filter, patch, and stats semantics live here so both behave the same.
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    Assignment, Course, Credential, EnrollmentPoint, NewStudent, StatusDistribution, Student,
    StudentFilters, StudentPatch, StudentStats, StudentStatus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub const STUDENT_NOT_FOUND: &str = "Student not found";

/// New credential row. The hash is produced by the caller; stores never
/// see raw passwords.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub email: String,
    pub password_hash: String,
    pub remember_me: bool,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    /// One page of the filtered set plus the pre-pagination total.
    /// `page` is 1-based.
    async fn list(
        &self,
        page: i64,
        limit: i64,
        filters: &StudentFilters,
    ) -> Result<(Vec<Student>, i64), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Student, StoreError>;

    async fn create(&self, new: &NewStudent) -> Result<Student, StoreError>;

    /// Partial merge; supplied nested objects replace the stored ones
    /// wholesale. Last write wins on concurrent updates.
    async fn update(&self, id: Uuid, patch: &StudentPatch) -> Result<Student, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Full filtered set, unpaginated. Used by export and stats.
    async fn find_all(&self, filters: &StudentFilters) -> Result<Vec<Student>, StoreError>;

    async fn courses(&self, student_id: Uuid) -> Result<Vec<Course>, StoreError>;

    async fn assignments(&self, student_id: Uuid) -> Result<Vec<Assignment>, StoreError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive exact match on email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    /// Fails with `Duplicate` when the email is already registered
    /// (case-insensitively).
    async fn insert(&self, new: &NewCredential) -> Result<Credential, StoreError>;
}

/// Development login account (admin@example.com / admin123). Inserted at
/// startup when missing, for either store variant.
pub async fn ensure_admin_seed(store: &dyn CredentialStore) -> Result<bool, StoreError> {
    if store.find_by_email("admin@example.com").await?.is_some() {
        return Ok(false);
    }

    let password_hash = crate::auth::hash_password("admin123")
        .map_err(|e| StoreError::Query(format!("cannot hash seed password: {}", e)))?;
    store
        .insert(&NewCredential {
            email: "admin@example.com".to_string(),
            password_hash,
            remember_me: false,
            first_name: "Site".to_string(),
            last_name: "Admin".to_string(),
            role: "admin".to_string(),
        })
        .await?;
    Ok(true)
}

/// Filter predicate shared by the memory store and the export/stats paths.
/// The postgres store expresses the same conditions in SQL.
pub fn matches_filters(student: &Student, filters: &StudentFilters) -> bool {
    if let Some(search) = &filters.search {
        let needle = search.to_lowercase();
        let hit = student.first_name.to_lowercase().contains(&needle)
            || student.last_name.to_lowercase().contains(&needle)
            || student.email.to_lowercase().contains(&needle)
            || student.student_id.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }
    if let Some(status) = &filters.status {
        if student.status.as_str() != status {
            return false;
        }
    }
    if let Some(grade) = &filters.grade {
        if &student.grade != grade {
            return false;
        }
    }
    if let Some(start) = filters.start_date {
        if student.enrollment_date < start {
            return false;
        }
    }
    if let Some(end) = filters.end_date {
        if student.enrollment_date > end {
            return false;
        }
    }
    true
}

/// Merge a patch into a record. Nested objects are replaced as a unit,
/// never deep-merged; `updatedAt` is refreshed.
pub fn apply_patch(student: &mut Student, patch: &StudentPatch) {
    if let Some(v) = &patch.first_name {
        student.first_name = v.clone();
    }
    if let Some(v) = &patch.last_name {
        student.last_name = v.clone();
    }
    if let Some(v) = &patch.email {
        student.email = v.clone();
    }
    if let Some(v) = &patch.student_id {
        student.student_id = v.clone();
    }
    if let Some(v) = patch.date_of_birth {
        student.date_of_birth = v;
    }
    if let Some(v) = patch.enrollment_date {
        student.enrollment_date = v;
    }
    if let Some(v) = &patch.grade {
        student.grade = v.clone();
    }
    if let Some(v) = patch.status {
        student.status = v;
    }
    if let Some(v) = &patch.phone_number {
        student.phone_number = v.clone();
    }
    if let Some(v) = &patch.address {
        student.address = Some(v.clone());
    }
    if let Some(v) = &patch.guardian_info {
        student.guardian_info = Some(v.clone());
    }
    if let Some(v) = &patch.academic_info {
        student.academic_info = Some(v.clone());
    }
    student.updated_at = Utc::now();
}

/// Turn a validated create payload into a record: fresh id, both
/// timestamps set to now. The password never lands on the record.
pub fn materialize(new: &NewStudent) -> Student {
    let now = Utc::now();
    Student {
        id: Uuid::new_v4(),
        first_name: new.first_name.clone(),
        last_name: new.last_name.clone(),
        email: new.email.clone(),
        student_id: new.student_id.clone(),
        date_of_birth: new.date_of_birth,
        enrollment_date: new.enrollment_date,
        grade: new.grade.clone(),
        status: new.status,
        phone_number: new.phone_number.clone(),
        address: new.address.clone(),
        guardian_info: new.guardian_info.clone(),
        academic_info: new.academic_info.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Aggregate statistics over a set of students.
pub fn compute_stats(students: &[Student]) -> StudentStats {
    let mut active = 0i64;
    let mut inactive = 0i64;
    let mut pending = 0i64;
    let mut gpa_sum = 0.0f64;
    let mut gpa_count = 0i64;
    let mut grades: BTreeMap<String, i64> = BTreeMap::new();
    let mut months: BTreeMap<String, i64> = BTreeMap::new();

    for s in students {
        match s.status {
            StudentStatus::Active => active += 1,
            StudentStatus::Inactive => inactive += 1,
            StudentStatus::Pending => pending += 1,
        }
        if let Some(gpa) = s.academic_info.as_ref().and_then(|a| a.gpa) {
            gpa_sum += gpa;
            gpa_count += 1;
        }
        *grades.entry(s.grade.clone()).or_insert(0) += 1;
        let month = format!("{:04}-{:02}", s.enrollment_date.year(), s.enrollment_date.month());
        *months.entry(month).or_insert(0) += 1;
    }

    StudentStats {
        total_students: students.len() as i64,
        active_students: active,
        pending_students: pending,
        inactive_students: inactive,
        average_gpa: if gpa_count > 0 { gpa_sum / gpa_count as f64 } else { 0.0 },
        grade_distribution: grades,
        enrollment_trend: months
            .into_iter()
            .map(|(date, count)| EnrollmentPoint { date, count })
            .collect(),
        status_distribution: StatusDistribution {
            active,
            inactive,
            pending,
        },
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::student;
    use super::*;
    use crate::types::{Address, GuardianInfo};
    use chrono::NaiveDate;

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let s = student("Ada", "Lovelace", "ada@example.com", "S-1001");
        for needle in ["ada", "LOVE", "EXAMPLE.COM", "s-10"] {
            let f = StudentFilters {
                search: Some(needle.into()),
                ..Default::default()
            };
            assert!(matches_filters(&s, &f), "expected match for {needle}");
        }
        let f = StudentFilters {
            search: Some("nobody".into()),
            ..Default::default()
        };
        assert!(!matches_filters(&s, &f));
    }

    #[test]
    fn empty_filters_match_everything() {
        let s = student("Ada", "Lovelace", "ada@example.com", "S-1001");
        assert!(matches_filters(&s, &StudentFilters::default()));
    }

    #[test]
    fn date_window_bounds_enrollment_inclusively() {
        let s = student("Ada", "Lovelace", "ada@example.com", "S-1001");
        let on = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let f = StudentFilters {
            start_date: Some(on),
            end_date: Some(on),
            ..Default::default()
        };
        assert!(matches_filters(&s, &f));

        let f = StudentFilters {
            start_date: Some(on.succ_opt().unwrap()),
            ..Default::default()
        };
        assert!(!matches_filters(&s, &f));
    }

    #[test]
    fn patch_replaces_nested_objects_wholesale() {
        let mut s = student("Ada", "Lovelace", "ada@example.com", "S-1001");
        s.address = Some(Address {
            street: "1 Old St".into(),
            city: "Oldtown".into(),
            state: "OS".into(),
            zip_code: "00000".into(),
            country: "US".into(),
        });

        let patch = StudentPatch {
            address: Some(Address {
                street: "2 New St".into(),
                city: "Newtown".into(),
                state: "NS".into(),
                zip_code: "11111".into(),
                country: "US".into(),
            }),
            ..Default::default()
        };
        let before = s.clone();
        apply_patch(&mut s, &patch);

        let addr = s.address.unwrap();
        // The whole object is the new one; nothing survives from the old
        assert_eq!(addr.city, "Newtown");
        assert_eq!(addr.zip_code, "11111");
        assert_eq!(s.first_name, before.first_name);
        assert!(s.updated_at >= before.updated_at);
        assert!(s.guardian_info.is_none());
    }

    #[test]
    fn patch_leaves_unsupplied_fields_untouched() {
        let mut s = student("Ada", "Lovelace", "ada@example.com", "S-1001");
        s.guardian_info = Some(GuardianInfo {
            name: "Anne".into(),
            relationship: "mother".into(),
            phone_number: "555-0101".into(),
            email: "anne@example.com".into(),
        });
        let before = s.clone();

        let patch = StudentPatch {
            status: Some(StudentStatus::Inactive),
            ..Default::default()
        };
        apply_patch(&mut s, &patch);

        assert_eq!(s.status, StudentStatus::Inactive);
        assert_eq!(s.first_name, before.first_name);
        assert_eq!(s.guardian_info, before.guardian_info);
        assert_eq!(s.academic_info, before.academic_info);
        assert_eq!(s.created_at, before.created_at);
    }

    #[test]
    fn stats_aggregate_status_gpa_and_trend() {
        let mut a = student("Ada", "Lovelace", "ada@example.com", "S-1");
        a.academic_info.as_mut().unwrap().gpa = Some(4.0);
        let mut b = student("Brian", "Kernighan", "brian@example.com", "S-2");
        b.status = StudentStatus::Pending;
        b.academic_info.as_mut().unwrap().gpa = Some(3.0);
        let mut c = student("Carol", "Shaw", "carol@example.com", "S-3");
        c.status = StudentStatus::Inactive;
        c.academic_info = None;
        c.enrollment_date = NaiveDate::from_ymd_opt(2024, 10, 15).unwrap();
        c.grade = "11".into();

        let stats = compute_stats(&[a, b, c]);
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.active_students, 1);
        assert_eq!(stats.pending_students, 1);
        assert_eq!(stats.inactive_students, 1);
        assert!((stats.average_gpa - 3.5).abs() < 1e-9);
        assert_eq!(stats.grade_distribution["10"], 2);
        assert_eq!(stats.grade_distribution["11"], 1);
        assert_eq!(stats.enrollment_trend.len(), 2);
        assert_eq!(stats.enrollment_trend[0].date, "2024-09");
        assert_eq!(stats.enrollment_trend[0].count, 2);
        assert_eq!(stats.status_distribution.active, 1);
    }

    #[test]
    fn stats_on_empty_set() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.average_gpa, 0.0);
        assert!(stats.grade_distribution.is_empty());
    }
}
