use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use ara_toast::config::Settings;
use ara_toast::manager::{ConfirmOptions, ToastManager};
use ara_toast::metrics::encode_metrics;
use ara_toast::notification::{NotificationOptions, NotificationType};
use ara_toast::persistence::MemoryStorage;
use ara_toast::scheduler::SystemClock;
use ara_toast::service::ToastService;
use ara_toast::telemetry::init_tracing;
use ara_toast::toast::HeadlessSurface;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;
    init_tracing(&settings.logging)?;
    tracing::info!("Configuration loaded");

    let surface = HeadlessSurface::new();
    let manager = ToastManager::new(
        settings.manager_config(),
        Box::new(surface.clone()),
        Arc::new(SystemClock),
    )
    .with_storage(Arc::new(MemoryStorage::new()));
    let handle = ToastService::spawn(manager);

    // Log every event as it happens
    let mut events = handle.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(
                event = event.kind().as_str(),
                notification_id = ?event.notification_id(),
                "Toast event"
            );
        }
    });

    handle
        .notify(NotificationType::Success, NotificationOptions::titled("Saved", "Draft stored"))
        .await?;
    // Same type and title within the group window: shows "Saved (2)"
    handle
        .notify(NotificationType::Success, NotificationOptions::titled("Saved", "Draft stored again"))
        .await?;

    let loading = handle.with(|manager| manager.loading("Uploading report")).await??;
    for step in 1..=4 {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let loading = loading.clone();
        handle
            .with(move |manager| loading.update_progress(manager, step as f32 / 4.0))
            .await?;
    }
    handle
        .with(move |manager| loading.success(manager, "Report uploaded"))
        .await?;

    handle
        .sequence(
            vec![
                (NotificationType::Info, "Step 1: fetch".into()),
                (NotificationType::Info, "Step 2: build".into()),
                (NotificationType::Success, "Step 3: deploy".into()),
            ],
            Duration::from_millis(400),
        )
        .await?;

    let confirmed = handle
        .confirm(
            ConfirmOptions::new("Discard unsaved changes?")
                .with_title("Unsaved changes")
                .with_timeout(Duration::from_secs(2)),
        )
        .await?;
    tracing::info!(confirmed = confirmed, "Confirmation answered");

    let (active, queued) = handle
        .with(|manager| (manager.active_count(), manager.queued_count()))
        .await?;
    tracing::info!(active = active, queued = queued, "Demo finished");

    handle.shutdown().await;
    // Last sender gone: the event log sees the channel close
    drop(handle);
    let _ = event_log.await;

    match encode_metrics() {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
