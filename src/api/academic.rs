use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::attendance::marking::MAX_SLOT_NUMBER;
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult, created, ok};
use crate::model::academic::{Class, Classroom, Faculty, Holiday, Student, Subject, TimetableSlot};
use crate::repo::academic_repo::{self, NewSubject, NewTimetableSlot};

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateClass {
    #[schema(example = "BSc CSE 2nd Year")]
    pub name: String,
    #[schema(example = "A")]
    pub section: Option<String>,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateSubject {
    #[schema(example = 4)]
    pub class_id: u64,
    #[schema(example = "CSE-201")]
    pub code: String,
    #[schema(example = "Data Structures")]
    pub name: String,
    #[schema(example = 7)]
    pub faculty_id: Option<u64>,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateStudent {
    #[schema(example = 4)]
    pub class_id: u64,
    #[schema(example = "CSE-24-001")]
    pub roll_number: String,
    #[schema(example = "Ayesha Rahman")]
    pub full_name: String,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateFaculty {
    #[schema(example = "Dr. Kamal Hossain")]
    pub full_name: String,
    #[schema(example = "kamal@university.edu", format = "email")]
    pub email: String,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "2026-03-26", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Independence Day")]
    pub title: String,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateClassroom {
    #[schema(example = "Room 204")]
    pub name: String,
    #[schema(example = "Science Block")]
    pub building: Option<String>,
    #[schema(example = 60)]
    pub capacity: u32,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateTimetableSlot {
    #[schema(example = 4)]
    pub class_id: u64,
    #[schema(example = 12)]
    pub subject_id: u64,
    #[schema(example = 3)]
    pub classroom_id: Option<u64>,
    /// 1 = Monday .. 7 = Sunday
    #[schema(example = 1)]
    pub weekday: u8,
    #[schema(example = 2)]
    pub slot_number: u32,
    #[schema(example = "10:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "10:50:00", value_type = String)]
    pub end_time: NaiveTime,
}

impl CreateTimetableSlot {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=7).contains(&self.weekday) {
            return Err("weekday must be between 1 (Monday) and 7 (Sunday)".into());
        }
        if self.slot_number == 0 || self.slot_number > MAX_SLOT_NUMBER {
            return Err(format!("slot_number must be between 1 and {}", MAX_SLOT_NUMBER));
        }
        if self.start_time >= self.end_time {
            return Err("start_time must be before end_time".into());
        }
        Ok(())
    }

    fn to_new(&self) -> NewTimetableSlot {
        NewTimetableSlot {
            class_id: self.class_id,
            subject_id: self.subject_id,
            classroom_id: self.classroom_id,
            weekday: self.weekday,
            slot_number: self.slot_number,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ClassFilter {
    /// Restrict to one class
    pub class_id: Option<u64>,
}

fn required(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

async fn ensure_class(pool: &MySqlPool, university_id: u64, class_id: u64) -> AppResult<()> {
    academic_repo::get_class(pool, university_id, class_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("Class not found"))
}

/// Create a class
#[utoipa::path(
    post,
    path = "/api/admin/classes",
    request_body = CreateClass,
    responses(
        (status = 201, description = "Class created", body = Object, example = json!({
            "success": true, "message": "Class created", "data": {"id": 4}
        })),
        (status = 400, description = "Name missing"),
        (status = 409, description = "Class already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn create_class(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateClass>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    required(&payload.name, "name")?;

    let id = academic_repo::create_class(
        pool.get_ref(),
        auth.university_id,
        payload.name.trim(),
        payload.section.as_deref().map(str::trim),
    )
    .await
    .map_err(|e| AppError::from(e).or_conflict("Class already exists"))?;

    Ok(created("Class created", json!({ "id": id })))
}

/// List classes
#[utoipa::path(
    get,
    path = "/api/admin/classes",
    responses((status = 200, description = "Classes", body = [Class])),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn list_classes(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let classes = academic_repo::list_classes(pool.get_ref(), auth.university_id).await?;
    Ok(ok("Classes fetched", classes))
}

/// Create a subject within a class
#[utoipa::path(
    post,
    path = "/api/admin/subjects",
    request_body = CreateSubject,
    responses(
        (status = 201, description = "Subject created"),
        (status = 400, description = "Code or name missing"),
        (status = 404, description = "Class or faculty not found"),
        (status = 409, description = "Subject code already used in class")
    ),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn create_subject(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSubject>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    required(&payload.code, "code")?;
    required(&payload.name, "name")?;
    ensure_class(pool.get_ref(), auth.university_id, payload.class_id).await?;

    if let Some(faculty_id) = payload.faculty_id {
        if !academic_repo::faculty_exists(pool.get_ref(), auth.university_id, faculty_id).await? {
            return Err(AppError::not_found("Faculty not found"));
        }
    }

    let subject = NewSubject {
        class_id: payload.class_id,
        code: payload.code.trim(),
        name: payload.name.trim(),
        faculty_id: payload.faculty_id,
    };
    let id = academic_repo::create_subject(pool.get_ref(), auth.university_id, &subject)
        .await
        .map_err(|e| AppError::from(e).or_conflict("Subject code already used in this class"))?;

    Ok(created("Subject created", json!({ "id": id })))
}

/// List subjects
#[utoipa::path(
    get,
    path = "/api/admin/subjects",
    params(ClassFilter),
    responses((status = 200, description = "Subjects", body = [Subject])),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn list_subjects(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ClassFilter>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let subjects =
        academic_repo::list_subjects(pool.get_ref(), auth.university_id, query.class_id).await?;
    Ok(ok("Subjects fetched", subjects))
}

/// Enrol a student in a class
#[utoipa::path(
    post,
    path = "/api/admin/students",
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Roll number already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn create_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateStudent>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    required(&payload.roll_number, "roll_number")?;
    required(&payload.full_name, "full_name")?;
    ensure_class(pool.get_ref(), auth.university_id, payload.class_id).await?;

    let id = academic_repo::create_student(
        pool.get_ref(),
        auth.university_id,
        payload.class_id,
        payload.roll_number.trim(),
        payload.full_name.trim(),
    )
    .await
    .map_err(|e| AppError::from(e).or_conflict("Roll number already used"))?;

    Ok(created("Student created", json!({ "id": id })))
}

/// List students
#[utoipa::path(
    get,
    path = "/api/admin/students",
    params(ClassFilter),
    responses((status = 200, description = "Students", body = [Student])),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn list_students(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ClassFilter>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let students =
        academic_repo::list_students(pool.get_ref(), auth.university_id, query.class_id).await?;
    Ok(ok("Students fetched", students))
}

/// Add a faculty member
#[utoipa::path(
    post,
    path = "/api/admin/faculty",
    request_body = CreateFaculty,
    responses(
        (status = 201, description = "Faculty created"),
        (status = 409, description = "Email already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn create_faculty(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateFaculty>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    required(&payload.full_name, "full_name")?;
    if !payload.email.contains('@') {
        return Err(AppError::validation("email is not valid"));
    }

    let id = academic_repo::create_faculty(
        pool.get_ref(),
        auth.university_id,
        payload.full_name.trim(),
        &payload.email.trim().to_lowercase(),
    )
    .await
    .map_err(|e| AppError::from(e).or_conflict("Email already used"))?;

    Ok(created("Faculty created", json!({ "id": id })))
}

/// List faculty
#[utoipa::path(
    get,
    path = "/api/admin/faculty",
    responses((status = 200, description = "Faculty", body = [Faculty])),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn list_faculty(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let faculty = academic_repo::list_faculty(pool.get_ref(), auth.university_id).await?;
    Ok(ok("Faculty fetched", faculty))
}

/// Declare a holiday; no attendance can be marked on it
#[utoipa::path(
    post,
    path = "/api/admin/holidays",
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday created"),
        (status = 409, description = "Date already a holiday")
    ),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateHoliday>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    required(&payload.title, "title")?;

    let id = academic_repo::create_holiday(
        pool.get_ref(),
        auth.university_id,
        payload.date,
        payload.title.trim(),
    )
    .await
    .map_err(|e| AppError::from(e).or_conflict("Date is already a holiday"))?;

    Ok(created("Holiday created", json!({ "id": id })))
}

/// List holidays
#[utoipa::path(
    get,
    path = "/api/admin/holidays",
    responses((status = 200, description = "Holidays", body = [Holiday])),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn list_holidays(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let holidays = academic_repo::list_holidays(pool.get_ref(), auth.university_id).await?;
    Ok(ok("Holidays fetched", holidays))
}

/// Add a classroom
#[utoipa::path(
    post,
    path = "/api/admin/classrooms",
    request_body = CreateClassroom,
    responses(
        (status = 201, description = "Classroom created"),
        (status = 400, description = "Name missing or zero capacity"),
        (status = 409, description = "Classroom name already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn create_classroom(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateClassroom>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    required(&payload.name, "name")?;
    if payload.capacity == 0 {
        return Err(AppError::validation("capacity must be greater than 0"));
    }

    let id = academic_repo::create_classroom(
        pool.get_ref(),
        auth.university_id,
        payload.name.trim(),
        payload.building.as_deref().map(str::trim),
        payload.capacity,
    )
    .await
    .map_err(|e| AppError::from(e).or_conflict("Classroom name already used"))?;

    Ok(created("Classroom created", json!({ "id": id })))
}

/// List classrooms
#[utoipa::path(
    get,
    path = "/api/admin/classrooms",
    responses((status = 200, description = "Classrooms", body = [Classroom])),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn list_classrooms(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let rooms = academic_repo::list_classrooms(pool.get_ref(), auth.university_id).await?;
    Ok(ok("Classrooms fetched", rooms))
}

/// Schedule a weekly period for a class.
/// The start time stored here is what late arrivals are measured against.
#[utoipa::path(
    post,
    path = "/api/admin/timetable",
    request_body = CreateTimetableSlot,
    responses(
        (status = 201, description = "Period scheduled"),
        (status = 400, description = "Bad weekday, slot or times, or subject of another class"),
        (status = 404, description = "Class, subject or classroom not found"),
        (status = 409, description = "Class or classroom already busy in that slot")
    ),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn create_timetable_slot(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTimetableSlot>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate().map_err(AppError::Validation)?;
    let university_id = auth.university_id;

    ensure_class(pool.get_ref(), university_id, payload.class_id).await?;
    let subject = academic_repo::get_subject(pool.get_ref(), university_id, payload.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subject not found"))?;
    if subject.class_id != payload.class_id {
        return Err(AppError::validation("Subject does not belong to this class"));
    }
    if let Some(classroom_id) = payload.classroom_id {
        if !academic_repo::classroom_exists(pool.get_ref(), university_id, classroom_id).await? {
            return Err(AppError::not_found("Classroom not found"));
        }
    }

    let id = academic_repo::create_timetable_slot(pool.get_ref(), university_id, &payload.to_new())
        .await
        .map_err(|e| {
            AppError::from(e).or_conflict("Class or classroom already has a period in that slot")
        })?;

    Ok(created("Period scheduled", json!({ "id": id })))
}

/// Weekly timetable
#[utoipa::path(
    get,
    path = "/api/admin/timetable",
    params(ClassFilter),
    responses((status = 200, description = "Timetable periods", body = [TimetableSlot])),
    security(("bearer_auth" = [])),
    tag = "Academic"
)]
pub async fn list_timetable(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ClassFilter>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let periods =
        academic_repo::list_timetable(pool.get_ref(), auth.university_id, query.class_id).await?;
    Ok(ok("Timetable fetched", periods))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> CreateTimetableSlot {
        serde_json::from_value(json!({
            "class_id": 4,
            "subject_id": 12,
            "classroom_id": 3,
            "weekday": 1,
            "slot_number": 2,
            "start_time": "10:00:00",
            "end_time": "10:50:00"
        }))
        .unwrap()
    }

    #[test]
    fn well_formed_period_passes() {
        assert!(period().validate().is_ok());
        let new = period().to_new();
        assert_eq!(new.start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(new.classroom_id, Some(3));
    }

    #[test]
    fn weekday_must_be_monday_to_sunday() {
        for weekday in [0, 8] {
            let p = CreateTimetableSlot { weekday, ..period() };
            assert!(p.validate().unwrap_err().contains("weekday"));
        }
        let sunday = CreateTimetableSlot { weekday: 7, ..period() };
        assert!(sunday.validate().is_ok());
    }

    #[test]
    fn slot_number_is_bounded() {
        for slot_number in [0, MAX_SLOT_NUMBER + 1] {
            let p = CreateTimetableSlot { slot_number, ..period() };
            assert!(p.validate().unwrap_err().contains("slot_number"));
        }
    }

    #[test]
    fn period_must_end_after_it_starts() {
        let p = CreateTimetableSlot {
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            ..period()
        };
        assert!(p.validate().unwrap_err().contains("start_time"));
    }
}
