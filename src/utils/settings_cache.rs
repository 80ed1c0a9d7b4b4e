use std::time::Duration;

use moka::future::Cache;
use sqlx::MySqlPool;

use crate::error::AppError;
use crate::model::settings::AttendanceSettings;
use crate::repo::settings_repo;

/// Tenant-keyed cache in front of `settings_repo::get_or_create`.
#[derive(Clone)]
pub struct SettingsCache {
    inner: Cache<u64, AttendanceSettings>,
}

impl SettingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(10_000) // one entry per university
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn resolve(
        &self,
        pool: &MySqlPool,
        university_id: u64,
    ) -> Result<AttendanceSettings, AppError> {
        self.inner
            .try_get_with(university_id, settings_repo::get_or_create(pool, university_id))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, university_id, "Failed to resolve attendance settings");
                AppError::Internal(e.to_string())
            })
    }

    /// Write-through after an update.
    pub async fn put(&self, settings: AttendanceSettings) {
        self.inner.insert(settings.university_id, settings).await;
    }

    #[cfg(test)]
    pub async fn cached(&self, university_id: u64) -> Option<AttendanceSettings> {
        self.inner.get(&university_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn put_overwrites_per_tenant() {
        let cache = SettingsCache::new(Duration::from_secs(60));
        assert!(cache.cached(4).await.is_none());

        let mut settings = AttendanceSettings::defaults_for(4);
        settings.min_attendance_percentage = 60.0;
        cache.put(settings.clone()).await;
        assert_eq!(cache.cached(4).await, Some(settings.clone()));
        assert!(cache.cached(5).await.is_none());

        settings.min_attendance_percentage = 65.0;
        cache.put(settings).await;
        assert_eq!(cache.cached(4).await.map(|s| s.min_attendance_percentage), Some(65.0));
    }
}
