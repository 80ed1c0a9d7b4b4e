use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One row per (class, subject, date, slot, student) inside a university.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "university_id": 1,
    "class_id": 4,
    "subject_id": 12,
    "student_id": 301,
    "faculty_id": 7,
    "date": "2026-02-02",
    "slot_number": 2,
    "status": "PRESENT",
    "reason": null,
    "marked_at": "2026-02-02T09:05:00Z"
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub university_id: u64,
    pub class_id: u64,
    pub subject_id: u64,
    pub student_id: u64,
    pub faculty_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub slot_number: u32,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub marked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_any_case_and_prints_upper() {
        assert_eq!(
            AttendanceStatus::try_from("late".to_string()).unwrap(),
            AttendanceStatus::Late
        );
        assert_eq!(AttendanceStatus::Excused.as_ref(), "EXCUSED");
        assert!(AttendanceStatus::try_from("tardy".to_string()).is_err());
    }

    #[test]
    fn status_uses_upper_case_on_the_wire() {
        let json = serde_json::to_string(&AttendanceStatus::Present).unwrap();
        assert_eq!(json, "\"PRESENT\"");
        let back: AttendanceStatus = serde_json::from_str("\"ABSENT\"").unwrap();
        assert_eq!(back, AttendanceStatus::Absent);
    }
}
