pub mod academic;
pub mod attendance;
pub mod role;
pub mod settings;
