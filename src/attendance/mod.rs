//! Attendance aggregation: counting rules, tenant policy and the reports
//! built on top of them. Nothing in here touches the database.

pub mod marking;
pub mod policy;
pub mod report;
pub mod stats;

pub use policy::{AttendancePolicy, Standing};
pub use stats::{AttendanceCounts, AttendanceStats};
