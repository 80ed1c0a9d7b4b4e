pub mod academic_repo;
pub mod attendance_repo;
pub mod settings_repo;
