pub mod settings_cache;
pub mod username_filter;
