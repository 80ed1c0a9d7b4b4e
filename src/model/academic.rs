use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({"id": 4, "university_id": 1, "name": "BSc CSE 2nd Year", "section": "A"}))]
pub struct Class {
    pub id: u64,
    pub university_id: u64,
    pub name: String,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 12, "university_id": 1, "class_id": 4,
    "code": "CSE-201", "name": "Data Structures", "faculty_id": 7
}))]
pub struct Subject {
    pub id: u64,
    pub university_id: u64,
    pub class_id: u64,
    pub code: String,
    pub name: String,
    pub faculty_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 301, "university_id": 1, "class_id": 4,
    "roll_number": "CSE-24-001", "full_name": "Ayesha Rahman"
}))]
pub struct Student {
    pub id: u64,
    pub university_id: u64,
    pub class_id: u64,
    pub roll_number: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Faculty {
    pub id: u64,
    pub university_id: u64,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    pub id: u64,
    pub university_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 3, "university_id": 1, "name": "Room 204", "building": "Science Block", "capacity": 60
}))]
pub struct Classroom {
    pub id: u64,
    pub university_id: u64,
    pub name: String,
    pub building: Option<String>,
    pub capacity: u32,
}

/// One weekly period of a class: which subject runs in which slot, when, and where.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 21, "university_id": 1, "class_id": 4, "subject_id": 12, "classroom_id": 3,
    "weekday": 1, "slot_number": 2, "start_time": "10:00:00", "end_time": "10:50:00"
}))]
pub struct TimetableSlot {
    pub id: u64,
    pub university_id: u64,
    pub class_id: u64,
    pub subject_id: u64,
    pub classroom_id: Option<u64>,
    /// 1 = Monday .. 7 = Sunday
    pub weekday: u8,
    pub slot_number: u32,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
}
