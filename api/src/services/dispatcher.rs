//! Publishes every due pending schedule, on request or on a fixed interval

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::error::{ApiError, LogErr};
use super::platform::Platforms;
use super::publish::{PublishOverrides, PublishStore, TokenPolicy, publish_schedule};

#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DispatchReport {
    pub published: usize,
    pub failed: usize,
    /// Claimed by someone else between listing and publishing
    pub skipped: usize,
}

/// Publish due schedules one at a time, earliest first. A failure on one
/// schedule does not stop the rest.
pub async fn dispatch_due(
    store: &dyn PublishStore,
    platforms: &Platforms,
    policy: TokenPolicy,
) -> Result<DispatchReport, ApiError> {
    let due = store
        .list_due(Utc::now())
        .await
        .log_500("List due schedules error")?;

    let mut report = DispatchReport::default();
    let overrides = PublishOverrides::default();

    for schedule in due {
        let client = platforms.get(schedule.platform);
        match publish_schedule(store, client, schedule.id, &overrides, policy).await {
            Ok(_) => report.published += 1,
            Err(ApiError::Conflict(_)) => report.skipped += 1,
            Err(e) => {
                tracing::warn!(schedule_id = schedule.id, platform = %schedule.platform, error = %e, "dispatch failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run `dispatch_due` forever on `every`
pub async fn start_background_dispatcher(
    store: Arc<dyn PublishStore>,
    platforms: Platforms,
    policy: TokenPolicy,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match dispatch_due(store.as_ref(), &platforms, policy).await {
            Ok(report) if report == DispatchReport::default() => {}
            Ok(report) => tracing::info!(
                published = report.published,
                failed = report.failed,
                skipped = report.skipped,
                "dispatch finished"
            ),
            Err(e) => tracing::error!(error = %e, "dispatch run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use crate::domain::schedules::ScheduleStatus;
    use crate::services::platform::PlatformError;
    use crate::services::testing::{FakeClient, FakeStore};
    use chrono::Duration;

    fn platforms(youtube: FakeClient, tiktok: FakeClient) -> (Platforms, Arc<FakeClient>, Arc<FakeClient>) {
        let youtube = Arc::new(youtube);
        let tiktok = Arc::new(tiktok);
        (
            Platforms {
                youtube: youtube.clone(),
                tiktok: tiktok.clone(),
            },
            youtube,
            tiktok,
        )
    }

    #[tokio::test]
    async fn test_dispatch_publishes_due_schedules_in_order() {
        let now = Utc::now();
        let store = FakeStore::default();
        store.add_video(1, "First", "https://cdn.example.com/1.mp4");
        store.add_video(2, "Second", "https://cdn.example.com/2.mp4");
        store.add_token(Platform::Youtube, "tok", None, now + Duration::hours(1));
        store.add_schedule(10, 2, Platform::Youtube, now - Duration::minutes(1));
        store.add_schedule(11, 1, Platform::Youtube, now - Duration::minutes(30));
        store.add_schedule(12, 1, Platform::Youtube, now + Duration::hours(2));

        let (platforms, youtube, _) = platforms(
            FakeClient::new(Platform::Youtube),
            FakeClient::new(Platform::Tiktok),
        );
        let report = dispatch_due(&store, &platforms, TokenPolicy::default())
            .await
            .unwrap();

        assert_eq!(report, DispatchReport { published: 2, failed: 0, skipped: 0 });
        let titles: Vec<_> = youtube.published().into_iter().map(|(_, p)| p.title).collect();
        assert_eq!(titles, ["First", "Second"]);
        assert_eq!(store.schedule_status(12), ScheduleStatus::Pending);
    }

    #[tokio::test]
    async fn test_dispatch_continues_past_failures() {
        let now = Utc::now();
        let store = FakeStore::default();
        store.add_video(1, "Clip", "https://cdn.example.com/1.mp4");
        store.add_token(Platform::Tiktok, "tok", None, now + Duration::hours(1));
        store.add_schedule(1, 1, Platform::Youtube, now - Duration::minutes(3));
        store.add_schedule(2, 1, Platform::Tiktok, now - Duration::minutes(2));
        store.add_schedule(3, 1, Platform::Tiktok, now - Duration::minutes(1));

        let (platforms, _, tiktok) = platforms(
            FakeClient::new(Platform::Youtube),
            FakeClient::new(Platform::Tiktok).failing(PlatformError::InvalidResponse("boom".into())),
        );
        let report = dispatch_due(&store, &platforms, TokenPolicy::default())
            .await
            .unwrap();

        // youtube has no token, first tiktok publish fails, second succeeds
        assert_eq!(report, DispatchReport { published: 1, failed: 2, skipped: 0 });
        assert_eq!(store.schedule_status(1), ScheduleStatus::Pending);
        assert_eq!(store.schedule_status(2), ScheduleStatus::Pending);
        assert_eq!(store.schedule_status(3), ScheduleStatus::Published);
        assert_eq!(tiktok.published().len(), 1);
    }
}
