use crate::SdkResult;
use assetforge_core::{NotificationPage, NotificationPreferences, NotificationQuery};
use async_trait::async_trait;

/// REST surface the notification hub consumes.
///
/// Implemented by [`crate::AssetforgeClient`]; the hub only sees this trait so
/// it can run against an in-memory backend in tests.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn fetch_notifications(&self, query: &NotificationQuery) -> SdkResult<NotificationPage>;

    async fn fetch_unread_count(&self) -> SdkResult<u64>;

    async fn mark_as_read(&self, ids: &[String]) -> SdkResult<()>;

    async fn mark_all_as_read(&self) -> SdkResult<()>;

    async fn fetch_preferences(&self) -> SdkResult<NotificationPreferences>;

    async fn save_preferences(&self, prefs: &NotificationPreferences) -> SdkResult<()>;
}
