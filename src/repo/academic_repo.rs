use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use sqlx::MySqlPool;

use crate::model::academic::{Class, Classroom, Faculty, Holiday, Student, Subject, TimetableSlot};

pub async fn create_class(
    pool: &MySqlPool,
    university_id: u64,
    name: &str,
    section: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO classes (university_id, name, section) VALUES (?, ?, ?)")
        .bind(university_id)
        .bind(name)
        .bind(section)
        .execute(pool)
        .await?;
    Ok(result.last_insert_id())
}

pub async fn list_classes(pool: &MySqlPool, university_id: u64) -> Result<Vec<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(
        "SELECT id, university_id, name, section FROM classes WHERE university_id = ? ORDER BY name",
    )
    .bind(university_id)
    .fetch_all(pool)
    .await
}

pub async fn get_class(
    pool: &MySqlPool,
    university_id: u64,
    class_id: u64,
) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(
        "SELECT id, university_id, name, section FROM classes WHERE university_id = ? AND id = ?",
    )
    .bind(university_id)
    .bind(class_id)
    .fetch_optional(pool)
    .await
}

pub async fn create_faculty(
    pool: &MySqlPool,
    university_id: u64,
    full_name: &str,
    email: &str,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("INSERT INTO faculty (university_id, full_name, email) VALUES (?, ?, ?)")
            .bind(university_id)
            .bind(full_name)
            .bind(email)
            .execute(pool)
            .await?;
    Ok(result.last_insert_id())
}

pub async fn list_faculty(pool: &MySqlPool, university_id: u64) -> Result<Vec<Faculty>, sqlx::Error> {
    sqlx::query_as::<_, Faculty>(
        "SELECT id, university_id, full_name, email FROM faculty WHERE university_id = ? ORDER BY full_name",
    )
    .bind(university_id)
    .fetch_all(pool)
    .await
}

pub async fn faculty_exists(
    pool: &MySqlPool,
    university_id: u64,
    faculty_id: u64,
) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM faculty WHERE university_id = ? AND id = ?",
    )
    .bind(university_id)
    .bind(faculty_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub struct NewSubject<'a> {
    pub class_id: u64,
    pub code: &'a str,
    pub name: &'a str,
    pub faculty_id: Option<u64>,
}

pub async fn create_subject(
    pool: &MySqlPool,
    university_id: u64,
    subject: &NewSubject<'_>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO subjects (university_id, class_id, code, name, faculty_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(university_id)
    .bind(subject.class_id)
    .bind(subject.code)
    .bind(subject.name)
    .bind(subject.faculty_id)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn list_subjects(
    pool: &MySqlPool,
    university_id: u64,
    class_id: Option<u64>,
) -> Result<Vec<Subject>, sqlx::Error> {
    let mut sql = String::from(
        "SELECT id, university_id, class_id, code, name, faculty_id FROM subjects WHERE university_id = ?",
    );
    if class_id.is_some() {
        sql.push_str(" AND class_id = ?");
    }
    sql.push_str(" ORDER BY class_id, code");

    let mut query = sqlx::query_as::<_, Subject>(&sql).bind(university_id);
    if let Some(class_id) = class_id {
        query = query.bind(class_id);
    }
    query.fetch_all(pool).await
}

pub async fn get_subject(
    pool: &MySqlPool,
    university_id: u64,
    subject_id: u64,
) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        r#"
        SELECT id, university_id, class_id, code, name, faculty_id
        FROM subjects
        WHERE university_id = ? AND id = ?
        "#,
    )
    .bind(university_id)
    .bind(subject_id)
    .fetch_optional(pool)
    .await
}

/// True when the faculty member teaches at least one subject of the class.
pub async fn faculty_teaches_class(
    pool: &MySqlPool,
    university_id: u64,
    faculty_id: u64,
    class_id: u64,
) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM subjects
        WHERE university_id = ? AND faculty_id = ? AND class_id = ?
        "#,
    )
    .bind(university_id)
    .bind(faculty_id)
    .bind(class_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn create_student(
    pool: &MySqlPool,
    university_id: u64,
    class_id: u64,
    roll_number: &str,
    full_name: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO students (university_id, class_id, roll_number, full_name) VALUES (?, ?, ?, ?)",
    )
    .bind(university_id)
    .bind(class_id)
    .bind(roll_number)
    .bind(full_name)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn list_students(
    pool: &MySqlPool,
    university_id: u64,
    class_id: Option<u64>,
) -> Result<Vec<Student>, sqlx::Error> {
    let mut sql = String::from(
        "SELECT id, university_id, class_id, roll_number, full_name FROM students WHERE university_id = ?",
    );
    if class_id.is_some() {
        sql.push_str(" AND class_id = ?");
    }
    sql.push_str(" ORDER BY roll_number");

    let mut query = sqlx::query_as::<_, Student>(&sql).bind(university_id);
    if let Some(class_id) = class_id {
        query = query.bind(class_id);
    }
    query.fetch_all(pool).await
}

pub async fn get_student(
    pool: &MySqlPool,
    university_id: u64,
    student_id: u64,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(
        r#"
        SELECT id, university_id, class_id, roll_number, full_name
        FROM students
        WHERE university_id = ? AND id = ?
        "#,
    )
    .bind(university_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub async fn enrolled_student_ids(
    pool: &MySqlPool,
    university_id: u64,
    class_id: u64,
) -> Result<HashSet<u64>, sqlx::Error> {
    let ids = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM students WHERE university_id = ? AND class_id = ?",
    )
    .bind(university_id)
    .bind(class_id)
    .fetch_all(pool)
    .await?;
    Ok(ids.into_iter().collect())
}

pub async fn create_holiday(
    pool: &MySqlPool,
    university_id: u64,
    date: NaiveDate,
    title: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO holidays (university_id, date, title) VALUES (?, ?, ?)")
        .bind(university_id)
        .bind(date)
        .bind(title)
        .execute(pool)
        .await?;
    Ok(result.last_insert_id())
}

pub async fn list_holidays(pool: &MySqlPool, university_id: u64) -> Result<Vec<Holiday>, sqlx::Error> {
    sqlx::query_as::<_, Holiday>(
        "SELECT id, university_id, date, title FROM holidays WHERE university_id = ? ORDER BY date",
    )
    .bind(university_id)
    .fetch_all(pool)
    .await
}

pub async fn holiday_on(
    pool: &MySqlPool,
    university_id: u64,
    date: NaiveDate,
) -> Result<Option<Holiday>, sqlx::Error> {
    sqlx::query_as::<_, Holiday>(
        "SELECT id, university_id, date, title FROM holidays WHERE university_id = ? AND date = ?",
    )
    .bind(university_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

pub async fn create_classroom(
    pool: &MySqlPool,
    university_id: u64,
    name: &str,
    building: Option<&str>,
    capacity: u32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO classrooms (university_id, name, building, capacity) VALUES (?, ?, ?, ?)",
    )
    .bind(university_id)
    .bind(name)
    .bind(building)
    .bind(capacity)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn list_classrooms(
    pool: &MySqlPool,
    university_id: u64,
) -> Result<Vec<Classroom>, sqlx::Error> {
    sqlx::query_as::<_, Classroom>(
        r#"
        SELECT id, university_id, name, building, capacity
        FROM classrooms
        WHERE university_id = ?
        ORDER BY name
        "#,
    )
    .bind(university_id)
    .fetch_all(pool)
    .await
}

pub async fn classroom_exists(
    pool: &MySqlPool,
    university_id: u64,
    classroom_id: u64,
) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM classrooms WHERE university_id = ? AND id = ?",
    )
    .bind(university_id)
    .bind(classroom_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub struct NewTimetableSlot {
    pub class_id: u64,
    pub subject_id: u64,
    pub classroom_id: Option<u64>,
    pub weekday: u8,
    pub slot_number: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

pub async fn create_timetable_slot(
    pool: &MySqlPool,
    university_id: u64,
    slot: &NewTimetableSlot,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO timetable_slots
            (university_id, class_id, subject_id, classroom_id, weekday, slot_number, start_time, end_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(university_id)
    .bind(slot.class_id)
    .bind(slot.subject_id)
    .bind(slot.classroom_id)
    .bind(slot.weekday)
    .bind(slot.slot_number)
    .bind(slot.start_time)
    .bind(slot.end_time)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

const TIMETABLE_COLUMNS: &str = "id, university_id, class_id, subject_id, classroom_id, weekday, slot_number, start_time, end_time";

pub async fn list_timetable(
    pool: &MySqlPool,
    university_id: u64,
    class_id: Option<u64>,
) -> Result<Vec<TimetableSlot>, sqlx::Error> {
    let mut sql = format!(
        "SELECT {} FROM timetable_slots WHERE university_id = ?",
        TIMETABLE_COLUMNS
    );
    if class_id.is_some() {
        sql.push_str(" AND class_id = ?");
    }
    sql.push_str(" ORDER BY class_id, weekday, slot_number");

    let mut query = sqlx::query_as::<_, TimetableSlot>(&sql).bind(university_id);
    if let Some(class_id) = class_id {
        query = query.bind(class_id);
    }
    query.fetch_all(pool).await
}

/// The scheduled period of `subject_id` for a class on a weekday, if any.
pub async fn timetable_slot(
    pool: &MySqlPool,
    university_id: u64,
    class_id: u64,
    subject_id: u64,
    weekday: u8,
    slot_number: u32,
) -> Result<Option<TimetableSlot>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {}
        FROM timetable_slots
        WHERE university_id = ? AND class_id = ? AND subject_id = ? AND weekday = ? AND slot_number = ?
        "#,
        TIMETABLE_COLUMNS
    );
    sqlx::query_as::<_, TimetableSlot>(&sql)
        .bind(university_id)
        .bind(class_id)
        .bind(subject_id)
        .bind(weekday)
        .bind(slot_number)
        .fetch_optional(pool)
        .await
}
