use sqlx::MySqlPool;

use crate::model::settings::AttendanceSettings;

const SELECT_SETTINGS: &str = r#"
    SELECT
        university_id,
        min_attendance_percentage,
        warn_at_percentage,
        allow_excused_absences,
        allow_self_marking,
        grace_time_for_late_marking_minutes,
        late_counts_as_present,
        students_can_view_reports
    FROM attendance_settings
    WHERE university_id = ?
"#;

/// Reads the tenant's settings, inserting the defaults on first access.
pub async fn get_or_create(
    pool: &MySqlPool,
    university_id: u64,
) -> Result<AttendanceSettings, sqlx::Error> {
    let existing = sqlx::query_as::<_, AttendanceSettings>(SELECT_SETTINGS)
        .bind(university_id)
        .fetch_optional(pool)
        .await?;

    if let Some(settings) = existing {
        return Ok(settings);
    }

    let d = AttendanceSettings::defaults_for(university_id);

    // IGNORE: a concurrent first read may have created the row already
    sqlx::query(
        r#"
        INSERT IGNORE INTO attendance_settings
            (university_id, min_attendance_percentage, warn_at_percentage,
             allow_excused_absences, allow_self_marking,
             grace_time_for_late_marking_minutes, late_counts_as_present,
             students_can_view_reports)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(d.university_id)
    .bind(d.min_attendance_percentage)
    .bind(d.warn_at_percentage)
    .bind(d.allow_excused_absences)
    .bind(d.allow_self_marking)
    .bind(d.grace_time_for_late_marking_minutes)
    .bind(d.late_counts_as_present)
    .bind(d.students_can_view_reports)
    .execute(pool)
    .await?;

    tracing::info!(university_id, "Created default attendance settings");

    sqlx::query_as::<_, AttendanceSettings>(SELECT_SETTINGS)
        .bind(university_id)
        .fetch_one(pool)
        .await
}

pub async fn save(pool: &MySqlPool, s: &AttendanceSettings) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE attendance_settings
        SET min_attendance_percentage = ?,
            warn_at_percentage = ?,
            allow_excused_absences = ?,
            allow_self_marking = ?,
            grace_time_for_late_marking_minutes = ?,
            late_counts_as_present = ?,
            students_can_view_reports = ?
        WHERE university_id = ?
        "#,
    )
    .bind(s.min_attendance_percentage)
    .bind(s.warn_at_percentage)
    .bind(s.allow_excused_absences)
    .bind(s.allow_self_marking)
    .bind(s.grace_time_for_late_marking_minutes)
    .bind(s.late_counts_as_present)
    .bind(s.students_can_view_reports)
    .bind(s.university_id)
    .execute(pool)
    .await?;

    Ok(())
}
