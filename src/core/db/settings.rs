use std::collections::HashMap;
use std::future::Future;

use crate::core::db::error::StoreError;

/// Keys used by surrounding features. All optional, all last-write-wins.
pub mod keys {
    pub const WORKER_NAME: &str = "workerName";
    pub const LAST_ACTIVE_PROJECT_ID: &str = "lastActiveProjectId";
    pub const DEFAULT_WORK_TYPE: &str = "defaultWorkType";
    pub const THEME: &str = "theme";
    pub const SYNC_ENABLED: &str = "syncEnabled";
    pub const LAST_SYNC_AT: &str = "lastSyncAt";
}

pub trait SettingsRepository {
    fn get_setting(&self, key: &str)
    -> impl Future<Output = Result<Option<String>, StoreError>>;
    fn set_setting(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>>;
    /// Returns only the keys actually present; default substitution is the
    /// caller's business.
    fn get_settings(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<HashMap<String, String>, StoreError>>;
    /// Upserts every pair in one transaction.
    fn set_settings(
        &self,
        entries: &[(&str, &str)],
    ) -> impl Future<Output = Result<(), StoreError>>;
}
