use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::policy::{AttendancePolicy, Standing};
use crate::model::attendance::AttendanceStatus;

/// Which non-present statuses still count towards the percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountingRules {
    pub late_counts_as_present: bool,
    pub excused_counts_as_present: bool,
}

impl Default for CountingRules {
    fn default() -> Self {
        Self {
            late_counts_as_present: true,
            excused_counts_as_present: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceCounts {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
}

impl AttendanceCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.present + self.absent + self.late + self.excused
    }

    pub fn attended(&self, rules: CountingRules) -> u32 {
        let mut attended = self.present;
        if rules.late_counts_as_present {
            attended += self.late;
        }
        if rules.excused_counts_as_present {
            attended += self.excused;
        }
        attended
    }

    /// Attended share of all records, 0..=100, unrounded. Zero records yields
    /// 0.0. Thresholds are compared against this value.
    pub fn exact_percentage(&self, rules: CountingRules) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.attended(rules) as f64 / total as f64 * 100.0
    }

    /// `exact_percentage` rounded to two decimals for display.
    pub fn percentage(&self, rules: CountingRules) -> f64 {
        round2(self.exact_percentage(rules))
    }
}

impl FromIterator<AttendanceStatus> for AttendanceCounts {
    fn from_iter<I: IntoIterator<Item = AttendanceStatus>>(iter: I) -> Self {
        let mut counts = AttendanceCounts::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}

/// Counts plus everything derived from them under a tenant's policy.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "present": 18, "absent": 4, "late": 2, "excused": 1,
    "total": 25, "percentage": 84.0, "standing": "good"
}))]
pub struct AttendanceStats {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
    pub total: u32,
    pub percentage: f64,
    pub standing: Standing,
    /// Unrounded percentage the standing was judged on
    #[serde(skip)]
    pub exact_percentage: f64,
}

impl AttendanceStats {
    pub fn from_counts(counts: AttendanceCounts, policy: &AttendancePolicy) -> Self {
        let total = counts.total();
        let exact = counts.exact_percentage(policy.counting);
        Self {
            present: counts.present,
            absent: counts.absent,
            late: counts.late,
            excused: counts.excused,
            total,
            percentage: round2(exact),
            standing: policy.standing(exact, total),
            exact_percentage: exact,
        }
    }
}

/// The one fold every report goes through.
pub fn aggregate<I>(statuses: I, policy: &AttendancePolicy) -> AttendanceStats
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    AttendanceStats::from_counts(statuses.into_iter().collect(), policy)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::AttendanceSettings;
    use AttendanceStatus::*;

    fn default_policy() -> AttendancePolicy {
        AttendancePolicy::from(&AttendanceSettings::defaults_for(1))
    }

    #[test]
    fn late_and_excused_count_as_present_by_default() {
        let stats = aggregate([Present, Absent, Late, Excused], &default_policy());
        assert_eq!(stats.total, 4);
        assert_eq!(stats.present, 1);
        assert_eq!(stats.absent, 1);
        assert_eq!(stats.percentage, 75.0);
    }

    #[test]
    fn percentage_matches_formula_for_mixed_batch() {
        // 7 present, 2 late, 1 excused, 5 absent => 10 / 15
        let statuses = std::iter::repeat(Present)
            .take(7)
            .chain(std::iter::repeat(Late).take(2))
            .chain(std::iter::once(Excused))
            .chain(std::iter::repeat(Absent).take(5));
        let stats = aggregate(statuses, &default_policy());
        assert_eq!(stats.total, 15);
        assert_eq!(stats.percentage, 66.67);
    }

    #[test]
    fn empty_input_is_zero_percent_with_no_data() {
        let stats = aggregate(Vec::new(), &default_policy());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.percentage, 0.0);
        assert_eq!(stats.standing, Standing::NoData);
    }

    #[test]
    fn disabled_excuses_count_as_absent() {
        let mut settings = AttendanceSettings::defaults_for(1);
        settings.allow_excused_absences = false;
        let policy = AttendancePolicy::from(&settings);

        let stats = aggregate([Present, Excused], &policy);
        assert_eq!(stats.excused, 1);
        assert_eq!(stats.percentage, 50.0);
    }

    #[test]
    fn late_can_be_excluded_from_attended() {
        let counts: AttendanceCounts = [Present, Late, Late, Absent].into_iter().collect();
        let strict = CountingRules {
            late_counts_as_present: false,
            excused_counts_as_present: true,
        };
        assert_eq!(counts.attended(strict), 1);
        assert_eq!(counts.percentage(strict), 25.0);
        assert_eq!(counts.percentage(CountingRules::default()), 75.0);
    }

    #[test]
    fn standing_uses_unrounded_share() {
        // 18749 / 25000 = 74.996%, displayed as 75.0 but still short of 75
        let counts = AttendanceCounts {
            present: 18_749,
            absent: 6_251,
            late: 0,
            excused: 0,
        };
        let policy = default_policy();
        let stats = AttendanceStats::from_counts(counts, &policy);
        assert_eq!(stats.percentage, 75.0);
        assert!(stats.exact_percentage < 75.0);
        assert_eq!(stats.standing, Standing::Shortage);
        assert!(policy.is_low(stats.exact_percentage, stats.total));
    }

    #[test]
    fn exact_share_is_hidden_from_json() {
        let stats = aggregate([Present, Absent, Absent], &default_policy());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["percentage"], 33.33);
        assert!(json.get("exact_percentage").is_none());
    }

    #[test]
    fn all_absent_is_zero() {
        let stats = aggregate([Absent, Absent, Absent], &default_policy());
        assert_eq!(stats.percentage, 0.0);
        assert_eq!(stats.standing, Standing::Shortage);
    }
}
