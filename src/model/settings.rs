use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_GRACE_MINUTES: u32 = 180;

/// Per-university attendance policy. One row per tenant, created on first read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceSettings {
    pub university_id: u64,
    #[schema(example = 75.0)]
    pub min_attendance_percentage: f64,
    #[schema(example = 80.0)]
    pub warn_at_percentage: f64,
    pub allow_excused_absences: bool,
    pub allow_self_marking: bool,
    #[schema(example = 10)]
    pub grace_time_for_late_marking_minutes: u32,
    pub late_counts_as_present: bool,
    pub students_can_view_reports: bool,
}

impl AttendanceSettings {
    pub fn defaults_for(university_id: u64) -> Self {
        Self {
            university_id,
            min_attendance_percentage: 75.0,
            warn_at_percentage: 80.0,
            allow_excused_absences: true,
            allow_self_marking: false,
            grace_time_for_late_marking_minutes: 10,
            late_counts_as_present: true,
            students_can_view_reports: true,
        }
    }

    /// Returns the first rule the settings break, if any.
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);

        if !in_range(self.min_attendance_percentage) {
            return Err("min_attendance_percentage must be between 0 and 100".into());
        }
        if !in_range(self.warn_at_percentage) {
            return Err("warn_at_percentage must be between 0 and 100".into());
        }
        if self.warn_at_percentage < self.min_attendance_percentage {
            return Err("warn_at_percentage cannot be below min_attendance_percentage".into());
        }
        if self.grace_time_for_late_marking_minutes > MAX_GRACE_MINUTES {
            return Err(format!(
                "grace_time_for_late_marking_minutes cannot exceed {}",
                MAX_GRACE_MINUTES
            ));
        }
        Ok(())
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateSettings {
    #[schema(example = 70.0)]
    pub min_attendance_percentage: Option<f64>,
    #[schema(example = 78.0)]
    pub warn_at_percentage: Option<f64>,
    pub allow_excused_absences: Option<bool>,
    pub allow_self_marking: Option<bool>,
    #[schema(example = 15)]
    pub grace_time_for_late_marking_minutes: Option<u32>,
    pub late_counts_as_present: Option<bool>,
    pub students_can_view_reports: Option<bool>,
}

impl UpdateSettings {
    pub fn apply_to(&self, current: &AttendanceSettings) -> AttendanceSettings {
        let mut next = current.clone();
        if let Some(v) = self.min_attendance_percentage {
            next.min_attendance_percentage = v;
        }
        if let Some(v) = self.warn_at_percentage {
            next.warn_at_percentage = v;
        }
        if let Some(v) = self.allow_excused_absences {
            next.allow_excused_absences = v;
        }
        if let Some(v) = self.allow_self_marking {
            next.allow_self_marking = v;
        }
        if let Some(v) = self.grace_time_for_late_marking_minutes {
            next.grace_time_for_late_marking_minutes = v;
        }
        if let Some(v) = self.late_counts_as_present {
            next.late_counts_as_present = v;
        }
        if let Some(v) = self.students_can_view_reports {
            next.students_can_view_reports = v;
        }
        next
    }
}
