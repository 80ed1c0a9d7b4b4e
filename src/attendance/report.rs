use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::policy::AttendancePolicy;
use crate::attendance::stats::{AttendanceCounts, AttendanceStats};
use crate::model::attendance::AttendanceRecord;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubjectSummary {
    pub subject_id: u64,
    pub class_id: u64,
    pub stats: AttendanceStats,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentSummary {
    pub student_id: u64,
    pub class_id: u64,
    pub stats: AttendanceStats,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClassSummary {
    pub class_id: u64,
    pub stats: AttendanceStats,
    pub subjects: Vec<SubjectSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailySummary {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub counts: AttendanceCounts,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LowAttendanceEntry {
    pub student_id: u64,
    pub class_id: u64,
    /// Set when the finder runs per subject.
    pub subject_id: Option<u64>,
    pub stats: AttendanceStats,
    pub student_name: Option<String>,
    pub roll_number: Option<String>,
}

/// Folds records into counts keyed by `key`, remembering the class each key
/// was first seen in.
fn group_counts<K, F>(records: &[AttendanceRecord], key: F) -> BTreeMap<K, (u64, AttendanceCounts)>
where
    K: Ord,
    F: Fn(&AttendanceRecord) -> K,
{
    let mut groups: BTreeMap<K, (u64, AttendanceCounts)> = BTreeMap::new();
    for record in records {
        let entry = groups
            .entry(key(record))
            .or_insert_with(|| (record.class_id, AttendanceCounts::default()));
        entry.1.add(record.status);
    }
    groups
}

pub fn overall(records: &[AttendanceRecord], policy: &AttendancePolicy) -> AttendanceStats {
    crate::attendance::stats::aggregate(records.iter().map(|r| r.status), policy)
}

pub fn summarize_by_subject(
    records: &[AttendanceRecord],
    policy: &AttendancePolicy,
) -> Vec<SubjectSummary> {
    group_counts(records, |r| r.subject_id)
        .into_iter()
        .map(|(subject_id, (class_id, counts))| SubjectSummary {
            subject_id,
            class_id,
            stats: AttendanceStats::from_counts(counts, policy),
        })
        .collect()
}

pub fn summarize_by_student(
    records: &[AttendanceRecord],
    policy: &AttendancePolicy,
) -> Vec<StudentSummary> {
    group_counts(records, |r| r.student_id)
        .into_iter()
        .map(|(student_id, (class_id, counts))| StudentSummary {
            student_id,
            class_id,
            stats: AttendanceStats::from_counts(counts, policy),
        })
        .collect()
}

pub fn summarize_by_class(
    records: &[AttendanceRecord],
    policy: &AttendancePolicy,
) -> Vec<ClassSummary> {
    let mut by_class: BTreeMap<u64, Vec<AttendanceRecord>> = BTreeMap::new();
    for record in records {
        by_class.entry(record.class_id).or_default().push(record.clone());
    }

    by_class
        .into_iter()
        .map(|(class_id, class_records)| ClassSummary {
            class_id,
            stats: overall(&class_records, policy),
            subjects: summarize_by_subject(&class_records, policy),
        })
        .collect()
}

pub fn daily_breakdown(records: &[AttendanceRecord]) -> Vec<DailySummary> {
    let mut by_day: BTreeMap<NaiveDate, AttendanceCounts> = BTreeMap::new();
    for record in records {
        by_day.entry(record.date).or_default().add(record.status);
    }
    by_day
        .into_iter()
        .map(|(date, counts)| DailySummary { date, counts })
        .collect()
}

/// Students in shortage, lowest percentage first. With `per_subject` each
/// (student, subject) pair is judged on its own.
pub fn low_attendance(
    records: &[AttendanceRecord],
    policy: &AttendancePolicy,
    per_subject: bool,
) -> Vec<LowAttendanceEntry> {
    let mut low: Vec<LowAttendanceEntry> = if per_subject {
        group_counts(records, |r| (r.student_id, r.subject_id))
            .into_iter()
            .map(|((student_id, subject_id), (class_id, counts))| LowAttendanceEntry {
                student_id,
                class_id,
                subject_id: Some(subject_id),
                stats: AttendanceStats::from_counts(counts, policy),
                student_name: None,
                roll_number: None,
            })
            .collect()
    } else {
        summarize_by_student(records, policy)
            .into_iter()
            .map(|s| LowAttendanceEntry {
                student_id: s.student_id,
                class_id: s.class_id,
                subject_id: None,
                stats: s.stats,
                student_name: None,
                roll_number: None,
            })
            .collect()
    };

    low.retain(|e| policy.is_low(e.stats.exact_percentage, e.stats.total));
    low.sort_by(|a, b| {
        a.stats
            .percentage
            .total_cmp(&b.stats.percentage)
            .then(a.student_id.cmp(&b.student_id))
            .then(a.subject_id.cmp(&b.subject_id))
    });
    low
}
