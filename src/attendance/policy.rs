use chrono::{Duration, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::stats::CountingRules;
use crate::model::attendance::AttendanceStatus;
use crate::model::settings::AttendanceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    NoData,
    Shortage,
    Warning,
    Good,
}

/// Settings resolved into the rules the aggregation and marking code apply.
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    pub min_percentage: f64,
    pub warn_percentage: f64,
    pub grace: Duration,
    pub counting: CountingRules,
    pub allow_excused: bool,
    pub allow_self_marking: bool,
    pub students_can_view_reports: bool,
}

impl From<&AttendanceSettings> for AttendancePolicy {
    fn from(s: &AttendanceSettings) -> Self {
        Self {
            min_percentage: s.min_attendance_percentage,
            warn_percentage: s.warn_at_percentage,
            grace: Duration::minutes(s.grace_time_for_late_marking_minutes as i64),
            counting: CountingRules {
                late_counts_as_present: s.late_counts_as_present,
                excused_counts_as_present: s.allow_excused_absences,
            },
            allow_excused: s.allow_excused_absences,
            allow_self_marking: s.allow_self_marking,
            students_can_view_reports: s.students_can_view_reports,
        }
    }
}

impl AttendancePolicy {
    pub fn standing(&self, percentage: f64, total: u32) -> Standing {
        if total == 0 {
            Standing::NoData
        } else if percentage < self.min_percentage {
            Standing::Shortage
        } else if percentage < self.warn_percentage {
            Standing::Warning
        } else {
            Standing::Good
        }
    }

    pub fn is_low(&self, percentage: f64, total: u32) -> bool {
        self.standing(percentage, total) == Standing::Shortage
    }

    /// A PRESENT mark arriving after `slot_start + grace` is stored as LATE.
    /// Everything else, including marks without times, is kept as requested.
    pub fn classify_arrival(
        &self,
        requested: AttendanceStatus,
        slot_start: Option<NaiveTime>,
        arrived_at: Option<NaiveTime>,
    ) -> AttendanceStatus {
        let (Some(start), Some(arrived)) = (slot_start, arrived_at) else {
            return requested;
        };
        if requested != AttendanceStatus::Present {
            return requested;
        }

        let (deadline, wrapped_secs) = start.overflowing_add_signed(self.grace);
        // deadline past midnight: nothing on this day can be late
        if wrapped_secs != 0 {
            return requested;
        }

        if arrived > deadline {
            AttendanceStatus::Late
        } else {
            requested
        }
    }

    pub fn check_reports_visible(&self) -> Result<(), String> {
        if !self.students_can_view_reports {
            return Err("Attendance reports are not available to students".into());
        }
        Ok(())
    }

    pub fn check_self_marking(&self) -> Result<(), String> {
        if !self.allow_self_marking {
            return Err("Self marking is disabled for this university".into());
        }
        Ok(())
    }

    pub fn check_markable(&self, status: AttendanceStatus) -> Result<(), String> {
        if status == AttendanceStatus::Excused && !self.allow_excused {
            return Err("Excused absences are disabled for this university".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AttendancePolicy {
        AttendancePolicy::from(&AttendanceSettings::defaults_for(1))
    }

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    #[test]
    fn standing_follows_thresholds() {
        let p = policy();
        assert_eq!(p.standing(0.0, 0), Standing::NoData);
        assert_eq!(p.standing(74.99, 10), Standing::Shortage);
        assert_eq!(p.standing(75.0, 10), Standing::Warning);
        assert_eq!(p.standing(79.99, 10), Standing::Warning);
        assert_eq!(p.standing(80.0, 10), Standing::Good);
        assert!(p.is_low(50.0, 4));
        assert!(!p.is_low(0.0, 0));
    }

    #[test]
    fn arrival_within_grace_stays_present() {
        let p = policy();
        let status = p.classify_arrival(AttendanceStatus::Present, t(9, 0), t(9, 10));
        assert_eq!(status, AttendanceStatus::Present);
    }

    #[test]
    fn arrival_after_grace_becomes_late() {
        let p = policy();
        let status = p.classify_arrival(AttendanceStatus::Present, t(9, 0), t(9, 11));
        assert_eq!(status, AttendanceStatus::Late);
    }

    #[test]
    fn missing_times_and_other_statuses_pass_through() {
        let p = policy();
        assert_eq!(
            p.classify_arrival(AttendanceStatus::Present, None, t(11, 0)),
            AttendanceStatus::Present
        );
        assert_eq!(
            p.classify_arrival(AttendanceStatus::Absent, t(9, 0), t(11, 0)),
            AttendanceStatus::Absent
        );
        assert_eq!(
            p.classify_arrival(AttendanceStatus::Excused, t(9, 0), t(11, 0)),
            AttendanceStatus::Excused
        );
    }

    #[test]
    fn grace_crossing_midnight_never_marks_late() {
        let p = policy();
        let status = p.classify_arrival(AttendanceStatus::Present, t(23, 55), t(23, 59));
        assert_eq!(status, AttendanceStatus::Present);
    }

    #[test]
    fn excused_marks_respect_toggle() {
        let mut settings = AttendanceSettings::defaults_for(1);
        assert!(AttendancePolicy::from(&settings)
            .check_markable(AttendanceStatus::Excused)
            .is_ok());

        settings.allow_excused_absences = false;
        let p = AttendancePolicy::from(&settings);
        assert!(p.check_markable(AttendanceStatus::Excused).is_err());
        assert!(p.check_markable(AttendanceStatus::Late).is_ok());
    }

    #[test]
    fn student_feature_toggles() {
        let mut settings = AttendanceSettings::defaults_for(1);
        let p = AttendancePolicy::from(&settings);
        assert!(p.check_reports_visible().is_ok());
        assert!(p.check_self_marking().is_err());

        settings.students_can_view_reports = false;
        settings.allow_self_marking = true;
        let p = AttendancePolicy::from(&settings);
        assert!(p.check_reports_visible().is_err());
        assert!(p.check_self_marking().is_ok());
    }
}
