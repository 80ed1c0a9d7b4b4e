use crate::api::academic::{
    CreateClass, CreateClassroom, CreateFaculty, CreateHoliday, CreateStudent, CreateSubject,
    CreateTimetableSlot,
};
use crate::api::admin_attendance::{LowAttendanceReport, TenantReport};
use crate::api::faculty_attendance::{ClassStats, MarkAttendance, MarkEntry, MarkResult};
use crate::api::student_attendance::{MyAttendance, MyHistory, SelfMark, SelfMarkResult};
use crate::api::users::RegisterUser;
use crate::attendance::report::{
    ClassSummary, DailySummary, LowAttendanceEntry, StudentSummary, SubjectSummary,
};
use crate::attendance::{AttendanceCounts, AttendanceStats, Standing};
use crate::auth::handlers::{Me, TokenPair};
use crate::model::academic::{Class, Classroom, Faculty, Holiday, Student, Subject, TimetableSlot};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::role::Role;
use crate::model::settings::{AttendanceSettings, UpdateSettings};
use crate::models::LoginReqDto;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Attendance API",
        version = "0.1.0",
        description = r#"
## University attendance service

Multi-tenant backend for admins, faculty and students.

### Key Features
- **Attendance marking** per timetable slot, with grace-period late detection
- **Reports** per class, subject and student
- **Low attendance** finder against the university's minimum percentage
- **Settings** per university: thresholds, excused absences, self marking

### Security
Endpoints under `/api` require a JWT Bearer access token. Every query is
scoped to the university in the token.

### Response Format
`{ "success": bool, "message": string, "data": any }`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::api::users::register_user,

        crate::api::academic::create_class,
        crate::api::academic::list_classes,
        crate::api::academic::create_subject,
        crate::api::academic::list_subjects,
        crate::api::academic::create_student,
        crate::api::academic::list_students,
        crate::api::academic::create_faculty,
        crate::api::academic::list_faculty,
        crate::api::academic::create_holiday,
        crate::api::academic::list_holidays,
        crate::api::academic::create_classroom,
        crate::api::academic::list_classrooms,
        crate::api::academic::create_timetable_slot,
        crate::api::academic::list_timetable,

        crate::api::settings::get_settings,
        crate::api::settings::update_settings,

        crate::api::admin_attendance::report,
        crate::api::admin_attendance::low_attendance,

        crate::api::faculty_attendance::mark_attendance,
        crate::api::faculty_attendance::list_records,
        crate::api::faculty_attendance::class_stats,

        crate::api::student_attendance::my_attendance,
        crate::api::student_attendance::my_history,
        crate::api::student_attendance::self_mark
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            Me,
            RegisterUser,
            Role,
            CreateClass,
            CreateSubject,
            CreateStudent,
            CreateFaculty,
            CreateHoliday,
            CreateClassroom,
            CreateTimetableSlot,
            Class,
            Subject,
            Student,
            Faculty,
            Holiday,
            Classroom,
            TimetableSlot,
            AttendanceSettings,
            UpdateSettings,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceCounts,
            AttendanceStats,
            Standing,
            SubjectSummary,
            StudentSummary,
            ClassSummary,
            DailySummary,
            LowAttendanceEntry,
            TenantReport,
            LowAttendanceReport,
            MarkAttendance,
            MarkEntry,
            MarkResult,
            ClassStats,
            MyAttendance,
            MyHistory,
            SelfMark,
            SelfMarkResult
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, tokens and account registration"),
        (name = "Academic", description = "Classes, subjects, people, holidays, rooms and the timetable"),
        (name = "Settings", description = "Per-university attendance policy"),
        (name = "Attendance", description = "Marking, statistics and reports"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_attendance_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/faculty/attendance"));
        assert!(doc.paths.paths.contains_key("/api/admin/attendance/low"));
        assert!(doc.paths.paths.contains_key("/api/admin/timetable"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("TimetableSlot"));
    }
}
