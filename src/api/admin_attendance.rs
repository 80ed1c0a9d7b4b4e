use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::attendance::report::{self, ClassSummary, LowAttendanceEntry};
use crate::attendance::{AttendancePolicy, AttendanceStats};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{AppError, AppResult, ok};
use crate::repo::academic_repo;
use crate::repo::attendance_repo::{self, RecordFilter};
use crate::utils::settings_cache::SettingsCache;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReportQuery {
    /// First day included (YYYY-MM-DD); defaults to the report window
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD)
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub class_id: Option<u64>,
    pub subject_id: Option<u64>,
}

impl ReportQuery {
    pub fn to_filter(&self, university_id: u64) -> RecordFilter {
        RecordFilter {
            university_id,
            from: self.from,
            to: self.to,
            class_id: self.class_id,
            subject_id: self.subject_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LowAttendanceQuery {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub class_id: Option<u64>,
    pub subject_id: Option<u64>,
    /// Judge every (student, subject) pair separately
    pub per_subject: Option<bool>,
    /// Overrides the configured minimum percentage for this query
    pub threshold: Option<f64>,
}

impl LowAttendanceQuery {
    pub fn to_filter(&self, university_id: u64) -> RecordFilter {
        RecordFilter {
            university_id,
            from: self.from,
            to: self.to,
            class_id: self.class_id,
            subject_id: self.subject_id,
            ..Default::default()
        }
    }

    /// The tenant policy with `threshold`, when given, as the minimum.
    pub fn apply_threshold(&self, mut policy: AttendancePolicy) -> AppResult<AttendancePolicy> {
        if let Some(threshold) = self.threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(AppError::validation("threshold must be between 0 and 100"));
            }
            policy.min_percentage = threshold;
        }
        Ok(policy)
    }
}

#[derive(Serialize, ToSchema)]
pub struct TenantReport {
    pub overall: AttendanceStats,
    pub classes: Vec<ClassSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct LowAttendanceReport {
    pub threshold: f64,
    pub students: Vec<LowAttendanceEntry>,
}

/// Attendance report for the whole university, grouped by class and subject
#[utoipa::path(
    get,
    path = "/api/admin/attendance/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report", body = TenantReport),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    config: web::Data<Config>,
    query: web::Query<ReportQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let filter = query.to_filter(auth.university_id);
    filter.validate().map_err(AppError::Validation)?;
    let filter = filter.with_default_window(Local::now().date_naive(), config.report_window_days);

    let settings = cache.resolve(pool.get_ref(), auth.university_id).await?;
    let policy = AttendancePolicy::from(&settings);

    let records = attendance_repo::fetch_records(pool.get_ref(), &filter).await?;
    tracing::debug!(university_id = auth.university_id, records = records.len(), "Building tenant report");

    Ok(ok(
        "Attendance report generated",
        TenantReport {
            overall: report::overall(&records, &policy),
            classes: report::summarize_by_class(&records, &policy),
        },
    ))
}

/// Students below the minimum attendance percentage
#[utoipa::path(
    get,
    path = "/api/admin/attendance/low",
    params(LowAttendanceQuery),
    responses(
        (status = 200, description = "Students in shortage, lowest first", body = LowAttendanceReport),
        (status = 400, description = "Invalid date range or threshold"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn low_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    config: web::Data<Config>,
    query: web::Query<LowAttendanceQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let filter = query.to_filter(auth.university_id);
    filter.validate().map_err(AppError::Validation)?;
    let filter = filter.with_default_window(Local::now().date_naive(), config.report_window_days);

    let settings = cache.resolve(pool.get_ref(), auth.university_id).await?;
    let policy = query.apply_threshold(AttendancePolicy::from(&settings))?;

    let records = attendance_repo::fetch_records(pool.get_ref(), &filter).await?;
    let mut students =
        report::low_attendance(&records, &policy, query.per_subject.unwrap_or(false));

    let directory: HashMap<u64, (String, String)> =
        academic_repo::list_students(pool.get_ref(), auth.university_id, query.class_id)
            .await?
            .into_iter()
            .map(|s| (s.id, (s.full_name, s.roll_number)))
            .collect();

    for entry in &mut students {
        if let Some((name, roll)) = directory.get(&entry.student_id) {
            entry.student_name = Some(name.clone());
            entry.roll_number = Some(roll.clone());
        }
    }

    tracing::info!(
        university_id = auth.university_id,
        flagged = students.len(),
        threshold = policy.min_percentage,
        "Low attendance query"
    );

    Ok(ok(
        "Low attendance students fetched",
        LowAttendanceReport {
            threshold: policy.min_percentage,
            students,
        },
    ))
}
