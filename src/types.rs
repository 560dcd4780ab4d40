// Wire and domain types for the student management API.
// Shapes mirror the frontend contract: camelCase JSON, optional nested
// address/guardian/academic objects that are supplied whole or not at all.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Pending,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Pending => "pending",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(StudentStatus::Active),
            "inactive" => Some(StudentStatus::Inactive),
            "pending" => Some(StudentStatus::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianInfo {
    pub name: String,
    pub relationship: String,
    pub phone_number: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
    pub date_of_birth: NaiveDate,
    pub enrollment_date: NaiveDate,
    pub grade: String,
    pub status: StudentStatus,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_info: Option<GuardianInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_info: Option<AcademicInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated create payload. `password`, when present, goes to the
/// credential store and never onto the student record.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
    pub date_of_birth: NaiveDate,
    pub enrollment_date: NaiveDate,
    pub grade: String,
    pub status: StudentStatus,
    pub phone_number: String,
    pub address: Option<Address>,
    pub guardian_info: Option<GuardianInfo>,
    pub academic_info: Option<AcademicInfo>,
    pub password: Option<String>,
}

/// Validated partial update. `None` leaves the field untouched; supplied
/// nested objects replace the stored one wholesale.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub enrollment_date: Option<NaiveDate>,
    pub grade: Option<String>,
    pub status: Option<StudentStatus>,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
    pub guardian_info: Option<GuardianInfo>,
    pub academic_info: Option<AcademicInfo>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.student_id.is_none()
            && self.date_of_birth.is_none()
            && self.enrollment_date.is_none()
            && self.grade.is_none()
            && self.status.is_none()
            && self.phone_number.is_none()
            && self.address.is_none()
            && self.guardian_info.is_none()
            && self.academic_info.is_none()
    }
}

/// Raw request body for create and update. Everything is optional at parse
/// time so that validation can report every problem field at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub date_of_birth: Option<String>,
    pub enrollment_date: Option<String>,
    pub grade: Option<String>,
    pub status: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
    pub guardian_info: Option<GuardianInfo>,
    pub academic_info: Option<AcademicInfo>,
    pub password: Option<String>,
}

impl StudentDraft {
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        serde_json::from_value(value)
            .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e), None))
    }

    /// Validate as a create payload: all required fields present and well formed.
    pub fn into_new(self) -> Result<NewStudent, ApiError> {
        let mut errors: HashMap<String, String> = HashMap::new();

        let first_name = required(&mut errors, "firstName", self.first_name);
        let last_name = required(&mut errors, "lastName", self.last_name);
        let email = required(&mut errors, "email", self.email);
        let student_id = required(&mut errors, "studentId", self.student_id);
        let grade = required(&mut errors, "grade", self.grade);
        let phone_number = required(&mut errors, "phoneNumber", self.phone_number);

        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.insert("email".into(), "Invalid email address".into());
            }
        }

        let date_of_birth = match self.date_of_birth.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_date(&mut errors, "dateOfBirth", raw),
            _ => {
                errors.insert("dateOfBirth".into(), REQUIRED_MSG.into());
                None
            }
        };
        let enrollment_date = match self.enrollment_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_date(&mut errors, "enrollmentDate", raw),
            _ => {
                errors.insert("enrollmentDate".into(), REQUIRED_MSG.into());
                None
            }
        };

        let status = match self.status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_status(&mut errors, raw),
            _ => {
                errors.insert("status".into(), REQUIRED_MSG.into());
                None
            }
        };

        check_gpa(&mut errors, self.academic_info.as_ref());

        if !errors.is_empty() {
            return Err(ApiError::validation_error("Validation failed", Some(errors)));
        }

        Ok(NewStudent {
            first_name: first_name.unwrap(),
            last_name: last_name.unwrap(),
            email: email.unwrap(),
            student_id: student_id.unwrap(),
            date_of_birth: date_of_birth.unwrap(),
            enrollment_date: enrollment_date.unwrap(),
            grade: grade.unwrap(),
            status: status.unwrap(),
            phone_number: phone_number.unwrap(),
            address: self.address,
            guardian_info: self.guardian_info,
            academic_info: self.academic_info,
            password: self.password.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        })
    }

    /// Validate as a partial update: only supplied fields are checked,
    /// with the same rules create applies.
    pub fn into_patch(self) -> Result<StudentPatch, ApiError> {
        let mut errors: HashMap<String, String> = HashMap::new();

        let first_name = supplied(&mut errors, "firstName", self.first_name);
        let last_name = supplied(&mut errors, "lastName", self.last_name);
        let email = supplied(&mut errors, "email", self.email);
        let student_id = supplied(&mut errors, "studentId", self.student_id);
        let grade = supplied(&mut errors, "grade", self.grade);
        let phone_number = supplied(&mut errors, "phoneNumber", self.phone_number);

        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.insert("email".into(), "Invalid email address".into());
            }
        }

        let date_of_birth = match self.date_of_birth.as_deref() {
            Some(raw) => parse_date(&mut errors, "dateOfBirth", raw.trim()),
            None => None,
        };
        let enrollment_date = match self.enrollment_date.as_deref() {
            Some(raw) => parse_date(&mut errors, "enrollmentDate", raw.trim()),
            None => None,
        };
        let status = match self.status.as_deref() {
            Some(raw) => parse_status(&mut errors, raw.trim()),
            None => None,
        };

        check_gpa(&mut errors, self.academic_info.as_ref());

        if !errors.is_empty() {
            return Err(ApiError::validation_error("Validation failed", Some(errors)));
        }

        Ok(StudentPatch {
            first_name,
            last_name,
            email,
            student_id,
            date_of_birth,
            enrollment_date,
            grade,
            status,
            phone_number,
            address: self.address,
            guardian_info: self.guardian_info,
            academic_info: self.academic_info,
        })
    }
}

const REQUIRED_MSG: &str = "This field is required";

fn required(
    errors: &mut HashMap<String, String>,
    field: &str,
    value: Option<String>,
) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.insert(field.to_string(), REQUIRED_MSG.to_string());
            None
        }
    }
}

/// Trim a supplied patch value; an explicit empty string is rejected the
/// same way create rejects a missing field. Unsupplied stays None.
fn supplied(
    errors: &mut HashMap<String, String>,
    field: &str,
    value: Option<String>,
) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        errors.insert(field.to_string(), REQUIRED_MSG.to_string());
        None
    } else {
        Some(trimmed)
    }
}

fn parse_date(errors: &mut HashMap<String, String>, field: &str, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert(field.to_string(), "Invalid date, expected YYYY-MM-DD".to_string());
            None
        }
    }
}

fn parse_status(errors: &mut HashMap<String, String>, raw: &str) -> Option<StudentStatus> {
    match StudentStatus::parse(raw) {
        Some(s) => Some(s),
        None => {
            errors.insert(
                "status".to_string(),
                "must be one of active, inactive, pending".to_string(),
            );
            None
        }
    }
}

fn check_gpa(errors: &mut HashMap<String, String>, academic: Option<&AcademicInfo>) {
    if let Some(gpa) = academic.and_then(|a| a.gpa) {
        if !(0.0..=4.0).contains(&gpa) {
            errors.insert(
                "academicInfo.gpa".to_string(),
                "gpa must be between 0.0 and 4.0".to_string(),
            );
        }
    }
}

/// Syntactic check only: one '@', non-empty local part, dotted domain.
pub fn is_valid_email(raw: &str) -> bool {
    let mut parts = raw.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

/// Query parameters accepted by list and export. Kept as raw strings so
/// that non-numeric page/limit fall back to defaults instead of erroring.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub grade: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> i64 {
        parse_positive(self.page.as_deref(), 1)
    }

    pub fn limit(&self) -> i64 {
        parse_positive(self.limit.as_deref(), 10)
    }

    pub fn filters(&self) -> StudentFilters {
        StudentFilters {
            search: non_empty(self.search.as_deref()),
            status: non_empty(self.status.as_deref()),
            grade: non_empty(self.grade.as_deref()),
            // Unparsable dates are ignored, same policy as non-numeric page/limit
            start_date: self
                .start_date
                .as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()),
            end_date: self
                .end_date
                .as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()),
        }
    }
}

fn parse_positive(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Normalized filter set shared by list and export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFilters {
    pub search: Option<String>,
    pub status: Option<String>,
    pub grade: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentsListResponse {
    pub students: Vec<Student>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDistribution {
    pub active: i64,
    pub inactive: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentPoint {
    /// Month bucket, YYYY-MM
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub total_students: i64,
    pub active_students: i64,
    pub pending_students: i64,
    pub inactive_students: i64,
    pub average_gpa: f64,
    pub grade_distribution: BTreeMap<String, i64>,
    pub enrollment_trend: Vec<EnrollmentPoint>,
    pub status_distribution: StatusDistribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSchedule {
    pub days: Vec<String>,
    pub time: String,
    pub room: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub credits: i32,
    pub instructor: String,
    pub schedule: CourseSchedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub total_points: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<bool>,
}

/// Login principal, as returned by /api/auth/login and /api/auth/me.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored login credential. The password hash never serializes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub remember_me: bool,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role.clone(),
            profile_image: None,
            is_email_verified: true,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_draft() -> Value {
        json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "studentId": "S-1001",
            "dateOfBirth": "2006-12-10",
            "enrollmentDate": "2024-09-01",
            "grade": "10",
            "status": "active",
            "phoneNumber": "555-0100",
            "password": "secret123"
        })
    }

    #[test]
    fn create_draft_validates_clean_payload() {
        let new = StudentDraft::from_value(full_draft()).unwrap().into_new().unwrap();
        assert_eq!(new.first_name, "Ada");
        assert_eq!(new.status, StudentStatus::Active);
        assert_eq!(new.password.as_deref(), Some("secret123"));
    }

    #[test]
    fn create_draft_collects_all_missing_fields() {
        let draft = StudentDraft::from_value(json!({ "firstName": "Ada" })).unwrap();
        let err = draft.into_new().unwrap_err();
        let body = err.to_json();
        let fields = body["fieldErrors"].as_object().unwrap();
        assert!(fields.contains_key("lastName"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("status"));
        assert!(fields.contains_key("dateOfBirth"));
        assert!(!fields.contains_key("firstName"));
    }

    #[test]
    fn create_draft_rejects_bad_status_and_email() {
        let mut v = full_draft();
        v["status"] = json!("graduated");
        v["email"] = json!("not-an-email");
        let err = StudentDraft::from_value(v).unwrap().into_new().unwrap_err();
        let body = err.to_json();
        assert!(body["fieldErrors"]["status"].as_str().unwrap().contains("active"));
        assert_eq!(body["fieldErrors"]["email"], "Invalid email address");
    }

    #[test]
    fn gpa_out_of_range_is_rejected() {
        let mut v = full_draft();
        v["academicInfo"] = json!({ "gpa": 4.5, "major": "Math" });
        let err = StudentDraft::from_value(v).unwrap().into_new().unwrap_err();
        assert!(err.detail().contains("gpa"));

        let mut v = full_draft();
        v["academicInfo"] = json!({ "gpa": 4.0, "major": "Math" });
        assert!(StudentDraft::from_value(v).unwrap().into_new().is_ok());
    }

    #[test]
    fn update_draft_only_checks_supplied_fields() {
        let draft = StudentDraft::from_value(json!({ "status": "inactive" })).unwrap();
        let patch = draft.into_patch().unwrap();
        assert_eq!(patch.status, Some(StudentStatus::Inactive));
        assert!(patch.first_name.is_none());

        let draft = StudentDraft::from_value(json!({ "status": "bogus" })).unwrap();
        assert!(draft.into_patch().is_err());
    }

    #[test]
    fn update_draft_rejects_blank_strings() {
        let draft = StudentDraft::from_value(json!({
            "firstName": "   ",
            "grade": "",
            "phoneNumber": "555-0100"
        }))
        .unwrap();
        let err = draft.into_patch().unwrap_err();
        let body = err.to_json();
        let fields = body["fieldErrors"].as_object().unwrap();
        assert!(fields.contains_key("firstName"));
        assert!(fields.contains_key("grade"));
        assert!(!fields.contains_key("phoneNumber"));
    }

    #[test]
    fn update_draft_trims_supplied_strings() {
        let draft = StudentDraft::from_value(json!({ "firstName": "  Ada  " })).unwrap();
        let patch = draft.into_patch().unwrap();
        assert_eq!(patch.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn list_params_fall_back_on_garbage() {
        let params = ListParams {
            page: Some("abc".into()),
            limit: Some("-3".into()),
            start_date: Some("not-a-date".into()),
            ..Default::default()
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 10);
        assert!(params.filters().start_date.is_none());
    }

    #[test]
    fn email_syntax_check() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a@.co"));
    }
}
