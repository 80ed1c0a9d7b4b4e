use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::attendance::policy::AttendancePolicy;
use crate::model::academic::{Holiday, TimetableSlot};
use crate::model::attendance::AttendanceStatus;

pub const MAX_SLOT_NUMBER: u32 = 12;

/// One student's mark as submitted.
#[derive(Debug, Clone)]
pub struct MarkInput {
    pub student_id: u64,
    pub status: AttendanceStatus,
    pub reason: Option<String>,
    pub arrived_at: Option<NaiveTime>,
}

/// A mark after policy has been applied, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMark {
    pub student_id: u64,
    pub status: AttendanceStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotRequest {
    pub date: NaiveDate,
    pub today: NaiveDate,
    pub slot_number: u32,
    pub slot_start: Option<NaiveTime>,
}

#[derive(Debug)]
pub struct PreparedMarks {
    pub marks: Vec<NewMark>,
    /// PRESENT marks turned into LATE by the grace rule
    pub late_adjusted: usize,
}

/// Timetable weekday of a date, 1 = Monday .. 7 = Sunday.
pub fn weekday_number(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

pub fn check_not_holiday(holiday: Option<&Holiday>) -> Result<(), String> {
    match holiday {
        Some(h) => Err(format!("{} is a holiday: {}", h.date, h.title)),
        None => Ok(()),
    }
}

/// Start time the grace period runs from. A scheduled slot always wins over
/// a submitted time, which only covers periods missing from the timetable.
pub fn resolve_slot_start(
    scheduled: Option<&TimetableSlot>,
    submitted: Option<NaiveTime>,
) -> Option<NaiveTime> {
    scheduled.map(|s| s.start_time).or(submitted)
}

/// Checks a marking batch against the slot rules and tenant policy and
/// applies the late-arrival rule. Rejects the whole batch on the first problem.
pub fn prepare_marks(
    policy: &AttendancePolicy,
    slot: SlotRequest,
    inputs: &[MarkInput],
    enrolled: &HashSet<u64>,
) -> Result<PreparedMarks, String> {
    if inputs.is_empty() {
        return Err("At least one attendance entry is required".into());
    }
    if slot.slot_number == 0 || slot.slot_number > MAX_SLOT_NUMBER {
        return Err(format!("slot_number must be between 1 and {}", MAX_SLOT_NUMBER));
    }
    if slot.date > slot.today {
        return Err("Attendance cannot be marked for a future date".into());
    }

    let mut seen = HashSet::with_capacity(inputs.len());
    let mut marks = Vec::with_capacity(inputs.len());
    let mut late_adjusted = 0;

    for input in inputs {
        if !seen.insert(input.student_id) {
            return Err(format!("Student {} appears more than once", input.student_id));
        }
        if !enrolled.contains(&input.student_id) {
            return Err(format!("Student {} is not enrolled in this class", input.student_id));
        }
        policy.check_markable(input.status)?;

        let status = policy.classify_arrival(input.status, slot.slot_start, input.arrived_at);
        if status != input.status {
            late_adjusted += 1;
        }

        let reason = input
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned);

        marks.push(NewMark {
            student_id: input.student_id,
            status,
            reason,
        });
    }

    Ok(PreparedMarks {
        marks,
        late_adjusted,
    })
}
