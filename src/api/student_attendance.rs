use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::attendance::marking::{
    MarkInput, NewMark, SlotRequest, check_not_holiday, prepare_marks, weekday_number,
};
use crate::attendance::report::{self, DailySummary, SubjectSummary};
use crate::attendance::{AttendancePolicy, AttendanceStats};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult, ok};
use crate::model::academic::{Holiday, Student, Subject, TimetableSlot};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::repo::academic_repo;
use crate::repo::attendance_repo::{self, RecordFilter, SlotKey};
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, Deserialize, IntoParams)]
pub struct StudentQuery {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub subject_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct MyAttendance {
    pub student_id: u64,
    pub overall: AttendanceStats,
    pub subjects: Vec<SubjectSummary>,
    pub min_attendance_percentage: f64,
    pub warn_at_percentage: f64,
}

#[derive(Serialize, ToSchema)]
pub struct MyHistory {
    pub records: Vec<AttendanceRecord>,
    pub daily: Vec<DailySummary>,
}

impl MyAttendance {
    pub fn build(student_id: u64, records: &[AttendanceRecord], policy: &AttendancePolicy) -> Self {
        Self {
            student_id,
            overall: report::overall(records, policy),
            subjects: report::summarize_by_subject(records, policy),
            min_attendance_percentage: policy.min_percentage,
            warn_at_percentage: policy.warn_percentage,
        }
    }
}

/// Start time comes from the timetable, never from the request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelfMark {
    #[schema(example = 12)]
    pub subject_id: u64,
    #[schema(example = 2)]
    pub slot_number: u32,
}

#[derive(Serialize, ToSchema)]
pub struct SelfMarkResult {
    pub status: AttendanceStatus,
}

/// The one mark a student may record for a period of today's timetable.
/// PRESENT, or LATE once the grace window after the scheduled start has passed.
fn plan_self_mark(
    policy: &AttendancePolicy,
    student: &Student,
    subject: &Subject,
    scheduled: Option<&TimetableSlot>,
    holiday: Option<&Holiday>,
    now: NaiveDateTime,
    slot_number: u32,
) -> AppResult<(SlotKey, NewMark)> {
    if subject.class_id != student.class_id {
        return Err(AppError::validation("Subject does not belong to your class"));
    }
    check_not_holiday(holiday).map_err(AppError::Validation)?;
    let scheduled = scheduled.ok_or_else(|| {
        AppError::validation("This subject has no timetable period in that slot today")
    })?;

    let today = now.date();
    let slot = SlotRequest {
        date: today,
        today,
        slot_number,
        slot_start: Some(scheduled.start_time),
    };
    let input = MarkInput {
        student_id: student.id,
        status: AttendanceStatus::Present,
        reason: None,
        arrived_at: Some(now.time()),
    };
    let enrolled: HashSet<u64> = HashSet::from([student.id]);
    let prepared = prepare_marks(policy, slot, &[input], &enrolled).map_err(AppError::Validation)?;
    let mark = prepared
        .marks
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("self mark produced no entry".into()))?;

    let key = SlotKey {
        university_id: student.university_id,
        class_id: student.class_id,
        subject_id: subject.id,
        faculty_id: subject.faculty_id,
        date: today,
        slot_number,
    };
    Ok((key, mark))
}

fn student_filter(university_id: u64, student_id: u64, query: &StudentQuery) -> RecordFilter {
    RecordFilter {
        from: query.from,
        to: query.to,
        subject_id: query.subject_id,
        student_id: Some(student_id),
        ..RecordFilter::for_university(university_id)
    }
}

/// Own attendance statistics, overall and per subject
#[utoipa::path(
    get,
    path = "/api/student/attendance",
    params(StudentQuery),
    responses(
        (status = 200, description = "Own statistics", body = MyAttendance),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Reports disabled for students")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    query: web::Query<StudentQuery>,
) -> AppResult<HttpResponse> {
    let student_id = auth.require_student()?;

    let settings = cache.resolve(pool.get_ref(), auth.university_id).await?;
    let policy = AttendancePolicy::from(&settings);
    policy.check_reports_visible().map_err(AppError::Forbidden)?;

    let filter = student_filter(auth.university_id, student_id, &query);
    filter.validate().map_err(AppError::Validation)?;

    let records = attendance_repo::fetch_records(pool.get_ref(), &filter).await?;

    Ok(ok(
        "Attendance statistics fetched",
        MyAttendance::build(student_id, &records, &policy),
    ))
}

/// Own attendance records with a per-day breakdown
#[utoipa::path(
    get,
    path = "/api/student/attendance/history",
    params(StudentQuery),
    responses(
        (status = 200, description = "Own records", body = MyHistory),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StudentQuery>,
) -> AppResult<HttpResponse> {
    let student_id = auth.require_student()?;

    let filter = student_filter(auth.university_id, student_id, &query);
    filter.validate().map_err(AppError::Validation)?;

    let records = attendance_repo::fetch_records(pool.get_ref(), &filter).await?;
    let daily = report::daily_breakdown(&records);

    Ok(ok("Attendance history fetched", MyHistory { records, daily }))
}

/// Mark yourself present for today's slot, when the university allows it
#[utoipa::path(
    post,
    path = "/api/student/attendance/self-mark",
    request_body = SelfMark,
    responses(
        (status = 200, description = "Marked", body = SelfMarkResult),
        (status = 400, description = "Holiday, bad slot or subject of another class"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Self marking disabled"),
        (status = 404, description = "Subject or student not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn self_mark(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    payload: web::Json<SelfMark>,
) -> AppResult<HttpResponse> {
    let student_id = auth.require_student()?;
    let university_id = auth.university_id;

    let settings = cache.resolve(pool.get_ref(), university_id).await?;
    let policy = AttendancePolicy::from(&settings);
    policy.check_self_marking().map_err(AppError::Forbidden)?;

    let student = academic_repo::get_student(pool.get_ref(), university_id, student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student not found"))?;
    let subject = academic_repo::get_subject(pool.get_ref(), university_id, payload.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subject not found"))?;

    let now = Local::now().naive_local();
    let today = now.date();
    let holiday = academic_repo::holiday_on(pool.get_ref(), university_id, today).await?;
    let scheduled = academic_repo::timetable_slot(
        pool.get_ref(),
        university_id,
        student.class_id,
        subject.id,
        weekday_number(today),
        payload.slot_number,
    )
    .await?;

    let (key, mark) = plan_self_mark(
        &policy,
        &student,
        &subject,
        scheduled.as_ref(),
        holiday.as_ref(),
        now,
        payload.slot_number,
    )?;
    attendance_repo::upsert_batch(pool.get_ref(), &key, std::slice::from_ref(&mark)).await?;

    let status = mark.status;
    info!(university_id, student_id, subject_id = subject.id, %status, "Student self-marked");

    Ok(ok("Attendance marked", SelfMarkResult { status }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::AttendanceSettings;
    use actix_web::ResponseError;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;
    use chrono::{NaiveTime, Utc};

    fn policy() -> AttendancePolicy {
        AttendancePolicy::from(&AttendanceSettings {
            allow_self_marking: true,
            ..AttendanceSettings::defaults_for(1)
        })
    }

    fn student() -> Student {
        Student {
            id: 301,
            university_id: 1,
            class_id: 4,
            roll_number: "CSE-24-001".into(),
            full_name: "Ayesha Rahman".into(),
        }
    }

    fn subject(class_id: u64) -> Subject {
        Subject {
            id: 12,
            university_id: 1,
            class_id,
            code: "CSE-201".into(),
            name: "Data Structures".into(),
            faculty_id: Some(7),
        }
    }

    fn period(start_h: u32) -> TimetableSlot {
        TimetableSlot {
            id: 21,
            university_id: 1,
            class_id: 4,
            subject_id: 12,
            classroom_id: Some(3),
            weekday: 1,
            slot_number: 2,
            start_time: NaiveTime::from_hms_opt(start_h, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(start_h + 1, 0, 0).unwrap(),
        }
    }

    // Monday 2026-03-02
    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn on_time_self_mark_is_present() {
        let (key, mark) =
            plan_self_mark(&policy(), &student(), &subject(4), Some(&period(9)), None, at(9, 5), 2)
                .unwrap();
        assert_eq!(mark.status, AttendanceStatus::Present);
        assert_eq!(mark.student_id, 301);
        assert_eq!(key.class_id, 4);
        assert_eq!(key.faculty_id, Some(7));
        assert_eq!(key.date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn self_mark_after_grace_is_late() {
        let (_, mark) =
            plan_self_mark(&policy(), &student(), &subject(4), Some(&period(9)), None, at(11, 30), 2)
                .unwrap();
        assert_eq!(mark.status, AttendanceStatus::Late);
    }

    #[test]
    fn unscheduled_period_is_rejected() {
        let err = plan_self_mark(&policy(), &student(), &subject(4), None, None, at(9, 5), 2)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_class_subject_is_rejected() {
        let err =
            plan_self_mark(&policy(), &student(), &subject(5), Some(&period(9)), None, at(9, 5), 2)
                .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn holiday_blocks_self_mark() {
        let holiday = Holiday {
            id: 1,
            university_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            title: "Founders Day".into(),
        };
        let err = plan_self_mark(
            &policy(),
            &student(),
            &subject(4),
            Some(&period(9)),
            Some(&holiday),
            at(9, 5),
            2,
        )
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Founders Day"));
    }

    #[test]
    fn disabled_features_map_to_403() {
        let defaults = AttendancePolicy::from(&AttendanceSettings {
            students_can_view_reports: false,
            ..AttendanceSettings::defaults_for(1)
        });

        let err = defaults.check_self_marking().map_err(AppError::Forbidden).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = defaults.check_reports_visible().map_err(AppError::Forbidden).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    fn record(subject_id: u64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: 0,
            university_id: 1,
            class_id: 4,
            subject_id,
            student_id: 301,
            faculty_id: Some(7),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            slot_number: 1,
            status,
            reason: None,
            marked_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn own_statistics_response_counts_late_and_excused() {
        use AttendanceStatus::*;
        // subject 12: P P L A => 75%, subject 13: E A => 50%, overall 4 / 6
        let records = vec![
            record(12, Present),
            record(12, Present),
            record(12, Late),
            record(12, Absent),
            record(13, Excused),
            record(13, Absent),
        ];

        let resp = ok("Attendance statistics fetched", MyAttendance::build(301, &records, &policy()));
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body()).await.unwrap()).unwrap();

        let data = &body["data"];
        assert_eq!(data["overall"]["total"], 6);
        assert_eq!(data["overall"]["percentage"], 66.67);
        assert_eq!(data["subjects"][0]["stats"]["percentage"], 75.0);
        assert_eq!(data["subjects"][1]["stats"]["percentage"], 50.0);
        assert_eq!(data["min_attendance_percentage"], 75.0);
    }
}
