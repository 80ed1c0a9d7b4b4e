use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::attendance::marking::{
    self, MarkInput, SlotRequest, check_not_holiday, prepare_marks, resolve_slot_start,
};
use crate::attendance::report::{self, StudentSummary, SubjectSummary};
use crate::attendance::{AttendancePolicy, AttendanceStats};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult, ok};
use crate::model::academic::Subject;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::repo::academic_repo;
use crate::repo::attendance_repo::{self, RecordFilter, SlotKey};
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkEntry {
    #[schema(example = 301)]
    pub student_id: u64,
    pub status: AttendanceStatus,
    #[schema(example = "Medical certificate")]
    pub reason: Option<String>,
    /// Arrival time; PRESENT marks later than slot start + grace become LATE
    #[schema(value_type = Option<String>, example = "09:14:00")]
    pub arrived_at: Option<NaiveTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAttendance {
    #[schema(example = 4)]
    pub class_id: u64,
    #[schema(example = 12)]
    pub subject_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-02-02")]
    pub date: NaiveDate,
    #[schema(example = 2)]
    pub slot_number: u32,
    /// Only used when the period is not on the timetable
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub slot_start: Option<NaiveTime>,
    pub entries: Vec<MarkEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct MarkResult {
    pub marked: usize,
    pub late_adjusted: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FacultyRecordQuery {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub class_id: Option<u64>,
    pub subject_id: Option<u64>,
    pub student_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ClassStatsQuery {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub subject_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct ClassStats {
    pub class_id: u64,
    pub overall: AttendanceStats,
    pub subjects: Vec<SubjectSummary>,
    pub students: Vec<StudentSummary>,
}

impl ClassStats {
    pub fn build(class_id: u64, records: &[AttendanceRecord], policy: &AttendancePolicy) -> Self {
        Self {
            class_id,
            overall: report::overall(records, policy),
            subjects: report::summarize_by_subject(records, policy),
            students: report::summarize_by_student(records, policy),
        }
    }
}

/// The subject must belong to the class being marked and be taught by the caller.
fn check_subject_assignment(subject: &Subject, class_id: u64, faculty_id: u64) -> AppResult<()> {
    if subject.class_id != class_id {
        return Err(AppError::validation("Subject does not belong to this class"));
    }
    if subject.faculty_id != Some(faculty_id) {
        return Err(AppError::forbidden("You do not teach this subject"));
    }
    Ok(())
}

/// Mark attendance for one slot (upsert per student)
#[utoipa::path(
    post,
    path = "/api/faculty/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Attendance saved", body = MarkResult),
        (status = 400, description = "Holiday, bad slot, subject of another class, unknown student or disallowed status"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the subject's faculty"),
        (status = 404, description = "Subject not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(
    name = "mark_attendance",
    skip_all,
    fields(
        university_id = auth.university_id,
        subject_id = payload.subject_id,
        date = %payload.date,
        slot = payload.slot_number
    )
)]
pub async fn mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    payload: web::Json<MarkAttendance>,
) -> AppResult<HttpResponse> {
    let faculty_id = auth.require_faculty()?;
    let payload = payload.into_inner();
    let university_id = auth.university_id;

    let subject = academic_repo::get_subject(pool.get_ref(), university_id, payload.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subject not found"))?;

    check_subject_assignment(&subject, payload.class_id, faculty_id)?;

    let holiday = academic_repo::holiday_on(pool.get_ref(), university_id, payload.date).await?;
    check_not_holiday(holiday.as_ref()).map_err(AppError::Validation)?;

    let scheduled = academic_repo::timetable_slot(
        pool.get_ref(),
        university_id,
        payload.class_id,
        payload.subject_id,
        marking::weekday_number(payload.date),
        payload.slot_number,
    )
    .await?;

    let settings = cache.resolve(pool.get_ref(), university_id).await?;
    let policy = AttendancePolicy::from(&settings);
    let enrolled =
        academic_repo::enrolled_student_ids(pool.get_ref(), university_id, payload.class_id).await?;

    let inputs: Vec<MarkInput> = payload
        .entries
        .into_iter()
        .map(|e| MarkInput {
            student_id: e.student_id,
            status: e.status,
            reason: e.reason,
            arrived_at: e.arrived_at,
        })
        .collect();

    let slot = SlotRequest {
        date: payload.date,
        today: Local::now().date_naive(),
        slot_number: payload.slot_number,
        slot_start: resolve_slot_start(scheduled.as_ref(), payload.slot_start),
    };
    let prepared = prepare_marks(&policy, slot, &inputs, &enrolled).map_err(AppError::Validation)?;

    let key = SlotKey {
        university_id,
        class_id: payload.class_id,
        subject_id: payload.subject_id,
        faculty_id: Some(faculty_id),
        date: payload.date,
        slot_number: payload.slot_number,
    };
    let marked = attendance_repo::upsert_batch(pool.get_ref(), &key, &prepared.marks).await?;

    info!(marked, late_adjusted = prepared.late_adjusted, "Attendance marked");

    Ok(ok(
        "Attendance marked successfully",
        MarkResult {
            marked,
            late_adjusted: prepared.late_adjusted,
        },
    ))
}

/// Records this faculty member has marked
#[utoipa::path(
    get,
    path = "/api/faculty/attendance/records",
    params(FacultyRecordQuery),
    responses(
        (status = 200, description = "Records", body = [AttendanceRecord]),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FacultyRecordQuery>,
) -> AppResult<HttpResponse> {
    let faculty_id = auth.require_faculty()?;

    let filter = RecordFilter {
        university_id: auth.university_id,
        from: query.from,
        to: query.to,
        class_id: query.class_id,
        subject_id: query.subject_id,
        student_id: query.student_id,
        faculty_id: Some(faculty_id),
    };
    filter.validate().map_err(AppError::Validation)?;

    let records = attendance_repo::fetch_records(pool.get_ref(), &filter).await?;
    Ok(ok("Attendance records fetched", records))
}

/// Class statistics by subject and by student
#[utoipa::path(
    get,
    path = "/api/faculty/attendance/class/{class_id}",
    params(
        ("class_id" = u64, Path, description = "Class to summarise"),
        ClassStatsQuery
    ),
    responses(
        (status = 200, description = "Class statistics", body = ClassStats),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Faculty does not teach this class"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn class_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    path: web::Path<u64>,
    query: web::Query<ClassStatsQuery>,
) -> AppResult<HttpResponse> {
    let faculty_id = auth.require_faculty()?;
    let class_id = path.into_inner();
    let university_id = auth.university_id;

    academic_repo::get_class(pool.get_ref(), university_id, class_id)
        .await?
        .ok_or_else(|| AppError::not_found("Class not found"))?;

    if !academic_repo::faculty_teaches_class(pool.get_ref(), university_id, faculty_id, class_id).await? {
        return Err(AppError::forbidden("You do not teach this class"));
    }

    let filter = RecordFilter {
        university_id,
        from: query.from,
        to: query.to,
        class_id: Some(class_id),
        subject_id: query.subject_id,
        ..Default::default()
    };
    filter.validate().map_err(AppError::Validation)?;

    let settings = cache.resolve(pool.get_ref(), university_id).await?;
    let policy = AttendancePolicy::from(&settings);
    let records = attendance_repo::fetch_records(pool.get_ref(), &filter).await?;

    Ok(ok(
        "Class attendance statistics",
        ClassStats::build(class_id, &records, &policy),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::AttendanceSettings;
    use actix_web::ResponseError;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;
    use chrono::Utc;

    fn subject(class_id: u64, faculty_id: Option<u64>) -> Subject {
        Subject {
            id: 12,
            university_id: 1,
            class_id,
            code: "CSE-201".into(),
            name: "Data Structures".into(),
            faculty_id,
        }
    }

    #[test]
    fn subject_must_belong_to_class_and_caller() {
        assert!(check_subject_assignment(&subject(4, Some(7)), 4, 7).is_ok());

        let err = check_subject_assignment(&subject(5, Some(7)), 4, 7).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = check_subject_assignment(&subject(4, Some(8)), 4, 7).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = check_subject_assignment(&subject(4, None), 4, 7).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    fn record(student_id: u64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: 0,
            university_id: 1,
            class_id: 4,
            subject_id: 12,
            student_id,
            faculty_id: Some(7),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            slot_number: 1,
            status,
            reason: None,
            marked_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn class_stats_response_reports_attended_share() {
        use AttendanceStatus::*;
        // 3 present, 1 late, 1 excused, 3 absent => 5 / 8 = 62.5%
        let statuses = [Present, Present, Present, Late, Excused, Absent, Absent, Absent];
        let records: Vec<AttendanceRecord> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| record(300 + (i as u64 % 2), *s))
            .collect();
        let policy = AttendancePolicy::from(&AttendanceSettings::defaults_for(1));

        let resp = ok("Class attendance statistics", ClassStats::build(4, &records, &policy));
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body()).await.unwrap()).unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["overall"]["total"], 8);
        assert_eq!(body["data"]["overall"]["percentage"], 62.5);
        assert_eq!(body["data"]["overall"]["standing"], "shortage");
        assert_eq!(body["data"]["students"].as_array().unwrap().len(), 2);
    }
}
