// CSV codec for bulk import and export. Import shares the create-payload
// validation, so a CSV row is held to exactly the same rules as a POST
// body; a bad row is recorded and never aborts the batch.
use std::collections::HashMap;

use crate::error::ApiError;
use crate::types::{AcademicInfo, NewStudent, Student, StudentDraft};

/// Outcome of one CSV data row. `row` is 1-based over data rows (the
/// header does not count).
pub struct ImportRow {
    pub row: usize,
    pub result: Result<NewStudent, String>,
}

pub fn parse_students_csv(data: &[u8]) -> Result<Vec<ImportRow>, ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ApiError::bad_request(format!("Unreadable CSV: {}", e)))?
        .clone();
    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    let mut rows = Vec::new();
    for (offset, record) in reader.records().enumerate() {
        let row = offset + 1;
        let result = match record {
            Ok(record) => row_to_student(&index, &record),
            Err(e) => Err(format!("Malformed CSV row: {}", e)),
        };
        rows.push(ImportRow { row, result });
    }
    Ok(rows)
}

fn row_to_student(
    index: &HashMap<&str, usize>,
    record: &csv::StringRecord,
) -> Result<NewStudent, String> {
    let field = |name: &str| -> Option<String> {
        index
            .get(name)
            .and_then(|i| record.get(*i))
            .map(str::to_string)
            .filter(|v| !v.is_empty())
    };

    let gpa = match field("gpa") {
        Some(raw) => Some(raw.parse::<f64>().map_err(|_| "gpa must be a number".to_string())?),
        None => None,
    };
    let major = field("major");
    let academic_info = if gpa.is_some() || major.is_some() {
        Some(AcademicInfo {
            gpa,
            major,
            class_level: field("classLevel"),
            advisor_id: None,
        })
    } else {
        None
    };

    let draft = StudentDraft {
        first_name: field("firstName"),
        last_name: field("lastName"),
        email: field("email"),
        student_id: field("studentId"),
        date_of_birth: field("dateOfBirth"),
        enrollment_date: field("enrollmentDate"),
        grade: field("grade"),
        status: field("status"),
        phone_number: field("phoneNumber"),
        academic_info,
        ..Default::default()
    };

    draft.into_new().map_err(|e| e.detail())
}

const EXPORT_HEADERS: [&str; 14] = [
    "id",
    "firstName",
    "lastName",
    "email",
    "studentId",
    "dateOfBirth",
    "enrollmentDate",
    "grade",
    "status",
    "phoneNumber",
    "gpa",
    "major",
    "createdAt",
    "updatedAt",
];

pub fn students_to_csv(students: &[Student]) -> Result<Vec<u8>, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPORT_HEADERS)
        .map_err(csv_write_error)?;

    for s in students {
        let gpa = s
            .academic_info
            .as_ref()
            .and_then(|a| a.gpa)
            .map(|g| g.to_string())
            .unwrap_or_default();
        let major = s
            .academic_info
            .as_ref()
            .and_then(|a| a.major.clone())
            .unwrap_or_default();

        writer
            .write_record([
                s.id.to_string().as_str(),
                &s.first_name,
                &s.last_name,
                &s.email,
                &s.student_id,
                &s.date_of_birth.to_string(),
                &s.enrollment_date.to_string(),
                &s.grade,
                s.status.as_str(),
                &s.phone_number,
                &gpa,
                &major,
                &s.created_at.to_rfc3339(),
                &s.updated_at.to_rfc3339(),
            ])
            .map_err(csv_write_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| csv_write_error(csv::Error::from(e.into_error())))
}

fn csv_write_error(e: csv::Error) -> ApiError {
    tracing::error!("csv encoding failed: {}", e);
    ApiError::internal_server_error("Failed to encode CSV")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::student;
    use crate::types::StudentStatus;

    const HEADER: &str =
        "firstName,lastName,email,studentId,dateOfBirth,enrollmentDate,grade,status,phoneNumber";

    #[test]
    fn parses_valid_rows() {
        let csv = format!(
            "{HEADER}\n\
             Ada,Lovelace,ada@example.com,S-1,2006-12-10,2024-09-01,10,active,555-0100\n\
             Brian,Kernighan,brian@example.com,S-2,2005-01-01,2024-09-02,11,pending,555-0101\n"
        );
        let rows = parse_students_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 1);
        let ada = rows[0].result.as_ref().unwrap();
        assert_eq!(ada.first_name, "Ada");
        assert_eq!(ada.status, StudentStatus::Active);
        assert!(rows[1].result.is_ok());
    }

    #[test]
    fn bad_row_is_reported_without_aborting() {
        let csv = format!(
            "{HEADER}\n\
             Ada,Lovelace,ada@example.com,S-1,2006-12-10,2024-09-01,10,active,555-0100\n\
             Brian,Kernighan,not-an-email,S-2,2005-01-01,2024-09-02,11,pending,555-0101\n\
             Carol,Shaw,carol@example.com,S-3,2004-06-06,2024-09-03,12,active,555-0102\n"
        );
        let rows = parse_students_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].result.is_ok());
        let err = rows[1].result.as_ref().unwrap_err();
        assert!(err.contains("email"), "unexpected error: {err}");
        assert_eq!(rows[1].row, 2);
        assert!(rows[2].result.is_ok());
    }

    #[test]
    fn short_row_reports_missing_fields() {
        let csv = format!("{HEADER}\nAda,Lovelace\n");
        let rows = parse_students_csv(csv.as_bytes()).unwrap();
        let err = rows[0].result.as_ref().unwrap_err();
        assert!(err.contains("email"));
    }

    #[test]
    fn optional_gpa_column_is_validated() {
        let csv = format!(
            "{}{}\nAda,Lovelace,ada@example.com,S-1,2006-12-10,2024-09-01,10,active,555-0100,4.7\n",
            HEADER, ",gpa"
        );
        let rows = parse_students_csv(csv.as_bytes()).unwrap();
        assert!(rows[0].result.as_ref().unwrap_err().contains("gpa"));
    }

    #[test]
    fn export_round_trips_through_import() {
        let s = student("Ada", "Lovelace", "ada@example.com", "S-1");
        let bytes = students_to_csv(&[s.clone()]).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("id,firstName"));
        assert!(text.contains("ada@example.com"));

        let rows = parse_students_csv(&bytes).unwrap();
        let parsed = rows[0].result.as_ref().unwrap();
        assert_eq!(parsed.email, s.email);
        assert_eq!(parsed.enrollment_date, s.enrollment_date);
        assert_eq!(
            parsed.academic_info.as_ref().unwrap().gpa,
            s.academic_info.as_ref().unwrap().gpa
        );
    }
}
