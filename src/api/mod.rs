pub mod academic;
pub mod admin_attendance;
pub mod faculty_attendance;
pub mod settings;
pub mod student_attendance;
pub mod users;
