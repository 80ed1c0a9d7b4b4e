use chrono::{Duration, NaiveDate};
use sqlx::MySqlPool;

use crate::attendance::marking::NewMark;
use crate::model::attendance::AttendanceRecord;

/// Query parameters for the record fetcher. Always tenant scoped.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub university_id: u64,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub class_id: Option<u64>,
    pub subject_id: Option<u64>,
    pub student_id: Option<u64>,
    pub faculty_id: Option<u64>,
}

impl RecordFilter {
    pub fn for_university(university_id: u64) -> Self {
        Self {
            university_id,
            ..Default::default()
        }
    }

    /// Without a lower bound, limits the range to the last `days` days up to
    /// `to` (or `today`).
    pub fn with_default_window(mut self, today: NaiveDate, days: u32) -> Self {
        if self.from.is_none() {
            let end = self.to.unwrap_or(today);
            self.from = Some(end - Duration::days(i64::from(days.max(1)) - 1));
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err("from cannot be after to".into());
            }
        }
        Ok(())
    }
}

// Helper enum for typed SQLx binding
#[derive(Debug, PartialEq)]
enum FilterValue {
    U64(u64),
    Date(NaiveDate),
}

fn build_where(filter: &RecordFilter) -> (String, Vec<FilterValue>) {
    let mut where_sql = String::from(" WHERE university_id = ?");
    let mut args = vec![FilterValue::U64(filter.university_id)];

    if let Some(from) = filter.from {
        where_sql.push_str(" AND date >= ?");
        args.push(FilterValue::Date(from));
    }
    if let Some(to) = filter.to {
        where_sql.push_str(" AND date <= ?");
        args.push(FilterValue::Date(to));
    }

    let ids = [
        ("class_id", filter.class_id),
        ("subject_id", filter.subject_id),
        ("student_id", filter.student_id),
        ("faculty_id", filter.faculty_id),
    ];
    for (column, value) in ids {
        if let Some(id) = value {
            where_sql.push_str(&format!(" AND {} = ?", column));
            args.push(FilterValue::U64(id));
        }
    }

    (where_sql, args)
}

pub async fn fetch_records(
    pool: &MySqlPool,
    filter: &RecordFilter,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let (where_sql, args) = build_where(filter);

    let sql = format!(
        r#"
        SELECT id, university_id, class_id, subject_id, student_id, faculty_id,
               date, slot_number, status, reason, marked_at
        FROM attendance_records
        {}
        ORDER BY date ASC, slot_number ASC, student_id ASC
        "#,
        where_sql
    );

    let mut query = sqlx::query_as::<_, AttendanceRecord>(&sql);
    for arg in args {
        query = match arg {
            FilterValue::U64(v) => query.bind(v),
            FilterValue::Date(d) => query.bind(d),
        };
    }

    query.fetch_all(pool).await
}

/// Identifies one timetable slot being marked.
#[derive(Debug, Clone)]
pub struct SlotKey {
    pub university_id: u64,
    pub class_id: u64,
    pub subject_id: u64,
    pub faculty_id: Option<u64>,
    pub date: NaiveDate,
    pub slot_number: u32,
}

/// Upserts every mark of a slot in one transaction; either all land or none.
pub async fn upsert_batch(
    pool: &MySqlPool,
    slot: &SlotKey,
    marks: &[NewMark],
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for mark in marks {
        sqlx::query(
            r#"
            INSERT INTO attendance_records
                (university_id, class_id, subject_id, student_id, faculty_id,
                 date, slot_number, status, reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                reason = VALUES(reason),
                faculty_id = VALUES(faculty_id)
            "#,
        )
        .bind(slot.university_id)
        .bind(slot.class_id)
        .bind(slot.subject_id)
        .bind(mark.student_id)
        .bind(slot.faculty_id)
        .bind(slot.date)
        .bind(slot.slot_number)
        .bind(mark.status.as_ref())
        .bind(mark.reason.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(marks.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_clause_is_always_first() {
        let (sql, args) = build_where(&RecordFilter::for_university(3));
        assert_eq!(sql, " WHERE university_id = ?");
        assert_eq!(args, vec![FilterValue::U64(3)]);
    }

    #[test]
    fn every_set_filter_adds_one_placeholder() {
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let filter = RecordFilter {
            university_id: 1,
            from: Some(from),
            subject_id: Some(12),
            student_id: Some(301),
            ..Default::default()
        };
        let (sql, args) = build_where(&filter);
        assert_eq!(
            sql,
            " WHERE university_id = ? AND date >= ? AND subject_id = ? AND student_id = ?"
        );
        assert_eq!(sql.matches('?').count(), args.len());
        assert_eq!(args[1], FilterValue::Date(from));
    }

    #[test]
    fn open_range_defaults_to_recent_window() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();

        let filter = RecordFilter::for_university(1).with_default_window(today, 90);
        assert_eq!(filter.from, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(filter.to, None);

        let ending = RecordFilter {
            to: NaiveDate::from_ymd_opt(2026, 2, 10),
            ..RecordFilter::for_university(1)
        }
        .with_default_window(today, 10);
        assert_eq!(ending.from, NaiveDate::from_ymd_opt(2026, 2, 1));

        let explicit = RecordFilter {
            from: NaiveDate::from_ymd_opt(2025, 9, 1),
            ..RecordFilter::for_university(1)
        }
        .with_default_window(today, 90);
        assert_eq!(explicit.from, NaiveDate::from_ymd_opt(2025, 9, 1));
    }

    #[test]
    fn inverted_range_is_invalid() {
        let filter = RecordFilter {
            university_id: 1,
            from: NaiveDate::from_ymd_opt(2026, 2, 1),
            to: NaiveDate::from_ymd_opt(2026, 1, 1),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }
}
