use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_test::{assert_pending, assert_ready};

use super::*;
use crate::config::{Theme, ToastConfig};
use crate::notification::{Action, CloseReason, NotificationOptions};
use crate::scheduler::ManualClock;
use crate::toast::{HeadlessSurface, Key, KeyChord, Phase, Region, ToastInput};

struct Harness {
    manager: ToastManager,
    surface: HeadlessSurface,
    clock: ManualClock,
}

impl Harness {
    fn new(config: ManagerConfig) -> Self {
        let surface = HeadlessSurface::new();
        let clock = ManualClock::default();
        let manager = ToastManager::new(config, Box::new(surface.clone()), Arc::new(clock.clone()));
        Self { manager, surface, clock }
    }

    fn advance(&mut self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
        self.manager.run_due();
    }
}

fn config(tweak: impl FnOnce(&mut ToastConfig)) -> ManagerConfig {
    let mut raw = ToastConfig::default();
    tweak(&mut raw);
    raw.validate()
}

fn created(admission: Admission) -> NotificationId {
    match admission {
        Admission::Created(id) => id,
        other => panic!("expected Created, got {:?}", other),
    }
}

fn reason_log(manager: &mut ToastManager) -> Arc<Mutex<Vec<CloseReason>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    manager.on(EventKind::Removed, move |event| {
        if let ToastEvent::Removed { reason, .. } = event {
            sink.lock().push(*reason);
        }
        Ok(())
    });
    log
}

#[test]
fn test_created_toast_is_attached_and_animated() {
    let mut h = Harness::new(ManagerConfig::default());
    let id = created(h.manager.success(NotificationOptions::titled("Saved", "All good")).unwrap());

    assert_eq!(h.surface.container(Position::TopRight), vec![id.clone()]);
    assert_eq!(h.surface.region(&id, Region::Title).as_deref(), Some("Saved"));
    assert_eq!(h.surface.region(&id, Region::Icon).as_deref(), Some("✓"));
    assert_eq!(h.surface.phase(&id), Some(Phase::Entering));

    h.advance(300);
    assert_eq!(h.surface.phase(&id), Some(Phase::Visible));
}

#[test]
fn test_auto_close_after_duration() {
    let mut h = Harness::new(ManagerConfig::default());
    let reasons = reason_log(&mut h.manager);
    let id = created(h.manager.info("short lived").unwrap());

    h.advance(4999);
    assert!(!h.manager.is_removing(&id));

    h.advance(1);
    assert!(h.manager.is_removing(&id));
    assert_eq!(h.surface.phase(&id), Some(Phase::Exiting));
    assert_eq!(h.manager.active_count(), 1);

    h.advance(300);
    assert_eq!(h.manager.active_count(), 0);
    assert!(h.surface.container(Position::TopRight).is_empty());
    assert_eq!(*reasons.lock(), vec![CloseReason::Timeout]);
}

#[test]
fn test_persistent_and_zero_duration_never_time_out() {
    let mut h = Harness::new(ManagerConfig::default());
    h.manager
        .info(NotificationOptions::message("sticky").with_persistent(true))
        .unwrap();
    h.manager
        .info(NotificationOptions::message("until dismissed").with_duration(Duration::ZERO))
        .unwrap();

    h.advance(60_000);
    assert_eq!(h.manager.active_count(), 2);
}

#[test]
fn test_removal_is_idempotent() {
    let mut h = Harness::new(ManagerConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = created(
        h.manager
            .info(NotificationOptions::message("bye").with_on_close(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap(),
    );

    assert!(h.manager.remove_by_id(&id, CloseReason::Manual));
    assert!(!h.manager.remove_by_id(&id, CloseReason::Manual));
    assert!(h.manager.get(&id).is_some());

    h.advance(300);
    assert!(h.manager.get(&id).is_none());
    assert!(!h.manager.remove_by_id(&id, CloseReason::Manual));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_close_callback_still_removes() {
    let mut h = Harness::new(ManagerConfig::default());
    let id = created(
        h.manager
            .info(NotificationOptions::message("x").with_on_close(|_, _| anyhow::bail!("boom")))
            .unwrap(),
    );

    assert!(h.manager.remove_by_id(&id, CloseReason::Manual));
    h.advance(300);
    assert_eq!(h.manager.active_count(), 0);
}

#[test]
fn test_merge_wins_over_queueing() {
    let mut h = Harness::new(config(|c| c.max_visible = 1));
    let id = created(h.manager.info(NotificationOptions::titled("Sync", "first")).unwrap());

    let admission = h.manager.info(NotificationOptions::titled("Sync", "second")).unwrap();
    assert_eq!(admission, Admission::Merged(id.clone()));
    assert_eq!(h.manager.queued_count(), 0);
    assert_eq!(h.surface.region(&id, Region::Title).as_deref(), Some("Sync (2)"));
    assert_eq!(h.surface.region(&id, Region::Message).as_deref(), Some("second"));
    assert_eq!(h.surface.phase(&id), Some(Phase::Attention));

    h.advance(600);
    assert_eq!(h.surface.phase(&id), Some(Phase::Visible));
}

#[test]
fn test_merge_rearms_auto_close() {
    let mut h = Harness::new(ManagerConfig::default());
    let id = created(h.manager.info(NotificationOptions::titled("Sync", "a")).unwrap());

    h.advance(1500);
    h.manager.info(NotificationOptions::titled("Sync", "b")).unwrap();
    h.advance(4000);
    assert!(!h.manager.is_removing(&id));
    h.advance(1000);
    assert!(h.manager.is_removing(&id));
}

#[test]
fn test_grouping_opt_out_and_disabled() {
    let mut h = Harness::new(ManagerConfig::default());
    h.manager.info(NotificationOptions::titled("T", "a")).unwrap();
    let second = h
        .manager
        .info(NotificationOptions::titled("T", "b").with_group(false))
        .unwrap();
    assert!(second.is_created());

    let mut h = Harness::new(config(|c| c.group_similar = false));
    h.manager.info(NotificationOptions::titled("T", "a")).unwrap();
    assert!(h.manager.info(NotificationOptions::titled("T", "b")).unwrap().is_created());
    assert_eq!(h.manager.group_len(), 0);
}

#[test]
fn test_sweep_expires_groups_but_keeps_notifications() {
    let mut h = Harness::new(ManagerConfig::default());
    h.manager
        .warning(NotificationOptions::titled("Disk", "low").with_persistent(true))
        .unwrap();
    assert_eq!(h.manager.group_count("warning:Disk"), Some(1));

    h.advance(10_000);
    assert_eq!(h.manager.group_len(), 0);
    assert_eq!(h.manager.active_count(), 1);
}

#[test]
fn test_update_in_place() {
    let mut h = Harness::new(ManagerConfig::default());
    let id = created(h.manager.info(NotificationOptions::titled("Upload", "0 files")).unwrap());
    let before = h.surface.render_count(&id, Region::Title);

    let updated = h.manager.update(&id, NotificationOptions::message("3 files"));
    assert_eq!(updated, Some(id.clone()));
    assert_eq!(h.surface.region(&id, Region::Message).as_deref(), Some("3 files"));
    assert_eq!(h.surface.render_count(&id, Region::Title), before);

    assert_eq!(h.manager.update(&NotificationId::from("nope"), NotificationOptions::message("x")), None);
}

#[test]
fn test_update_rearms_only_with_duration() {
    let mut h = Harness::new(ManagerConfig::default());
    let id = created(h.manager.info("tick").unwrap());

    h.advance(4000);
    h.manager.update(&id, NotificationOptions::message("no rearm"));
    h.advance(1000);
    assert!(h.manager.is_removing(&id));

    let id = created(h.manager.info("tock").unwrap());
    h.advance(4000);
    h.manager
        .update(&id, NotificationOptions::new().with_duration(Duration::from_millis(2000)));
    h.advance(1500);
    assert!(!h.manager.is_removing(&id));
    h.advance(500);
    assert!(h.manager.is_removing(&id));
}

#[test]
fn test_update_moves_between_containers() {
    let mut h = Harness::new(ManagerConfig::default());
    let id = created(h.manager.info("moving").unwrap());
    h.manager
        .update(&id, NotificationOptions::new().with_position(Position::BottomCenter));

    assert!(h.surface.container(Position::TopRight).is_empty());
    assert_eq!(h.surface.container(Position::BottomCenter), vec![id]);
    assert_eq!(
        h.manager.container_positions(),
        vec![Position::TopRight, Position::BottomCenter]
    );
}

#[test]
fn test_progress_countdown() {
    let mut h = Harness::new(ManagerConfig::default());
    let id = created(
        h.manager
            .build("info")
            .message("counting")
            .duration(Duration::from_millis(1000))
            .show_progress(true)
            .show()
            .unwrap(),
    );
    assert_eq!(h.surface.region(&id, Region::Progress).as_deref(), Some("100%"));

    h.advance(500);
    assert_eq!(h.surface.region(&id, Region::Progress).as_deref(), Some("50%"));

    h.advance(500);
    assert!(h.manager.is_removing(&id));
    assert_eq!(h.surface.region(&id, Region::Progress), None);
}

#[test]
fn test_close_button_and_body_click() {
    let mut h = Harness::new(ManagerConfig::default());
    let reasons = reason_log(&mut h.manager);
    let a = created(h.manager.info("a").unwrap());
    let b = created(h.manager.info("b").unwrap());
    let sticky = created(
        h.manager
            .info(NotificationOptions::message("c").with_persistent(true))
            .unwrap(),
    );

    assert!(h.manager.dispatch_input(&a, ToastInput::CloseButton));
    assert!(h.manager.dispatch_input(&b, ToastInput::Click));
    assert!(!h.manager.dispatch_input(&sticky, ToastInput::Click));
    assert!(!h.manager.dispatch_input(&a, ToastInput::Click));

    h.advance(300);
    assert_eq!(*reasons.lock(), vec![CloseReason::CloseButton, CloseReason::Click]);
}

#[test]
fn test_actions_run_callbacks_and_dismiss() {
    let mut h = Harness::new(ManagerConfig::default());
    let reasons = reason_log(&mut h.manager);
    let undo_calls = Arc::new(AtomicUsize::new(0));
    let counter = undo_calls.clone();

    let id = created(
        h.manager
            .info(NotificationOptions::message("Deleted").with_actions(vec![
                Action::new("Undo", move |ctx| {
                    assert_eq!(ctx.action_id, "undo");
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .with_id("undo"),
                Action::new("Dismiss", |_| anyhow::bail!("handler failed"))
                    .with_id("dismiss")
                    .dismiss_on_click(),
            ]))
            .unwrap(),
    );

    assert!(h.manager.dispatch_input(&id, ToastInput::Action("undo".into())));
    assert_eq!(undo_calls.load(Ordering::SeqCst), 1);
    assert!(!h.manager.is_removing(&id));

    assert!(h.manager.dispatch_input(&id, ToastInput::Action("dismiss".into())));
    assert!(h.manager.is_removing(&id));
    h.advance(300);
    assert_eq!(*reasons.lock(), vec![CloseReason::Action]);
}

#[test]
fn test_keyboard_shortcuts() {
    let mut h = Harness::new(ManagerConfig::default());
    let reasons = reason_log(&mut h.manager);
    let old = created(h.manager.info("old").unwrap());
    let newest = created(h.manager.info("newest").unwrap());
    let sticky = created(
        h.manager
            .info(NotificationOptions::message("sticky").with_persistent(true))
            .unwrap(),
    );

    // Escape takes the most recent one that is not already leaving
    assert!(h.manager.handle_shortcut(KeyChord::plain(Key::Escape)));
    assert!(h.manager.is_removing(&sticky));
    assert!(h.manager.handle_shortcut(KeyChord::plain(Key::Escape)));
    assert!(h.manager.is_removing(&newest));

    assert!(h.manager.handle_shortcut(KeyChord::ctrl_shift(Key::Other('X'))));
    assert!(h.manager.is_removing(&old));
    assert!(!h.manager.handle_shortcut(KeyChord::plain(Key::Enter)));

    h.advance(300);
    assert_eq!(
        *reasons.lock(),
        vec![CloseReason::Keyboard, CloseReason::Keyboard, CloseReason::Cleared]
    );
}

#[test]
fn test_shortcuts_can_be_disabled() {
    let mut h = Harness::new(config(|c| c.enable_keyboard_shortcuts = false));
    h.manager.info("x").unwrap();
    assert!(!h.manager.handle_shortcut(KeyChord::plain(Key::Escape)));
}

#[test]
fn test_clear_all_and_non_persistent() {
    let mut h = Harness::new(config(|c| c.max_visible = 2));
    h.manager.info("transient").unwrap();
    h.manager
        .info(NotificationOptions::message("sticky").with_persistent(true))
        .unwrap();
    h.manager.info("waiting").unwrap();
    assert_eq!(h.manager.queued_count(), 1);

    assert_eq!(h.manager.clear_non_persistent(), 1);
    assert_eq!(h.manager.queued_count(), 1);
    h.advance(300);
    assert_eq!(h.manager.active_count(), 2);

    assert_eq!(h.manager.clear_all(false), 1);
    assert_eq!(h.manager.queued_count(), 0);
    assert_eq!(h.manager.clear_all(true), 1);
    h.advance(300);
    assert_eq!(h.manager.active_count(), 0);
}

#[test]
fn test_confirm_resolves_on_answer() {
    let mut h = Harness::new(ManagerConfig::default());
    let rx = h
        .manager
        .confirm(ConfirmOptions::new("Delete 3 files?").with_title("Are you sure"))
        .unwrap();
    let mut answer = tokio_test::task::spawn(rx);
    assert_pending!(answer.poll());

    let id = h.manager.active()[0].id.clone();
    assert!(h.manager.get(&id).unwrap().persistent);
    assert_eq!(
        h.surface.region(&id, Region::Actions).as_deref(),
        Some("[Confirm]* [Cancel]")
    );

    assert!(h.manager.dispatch_input(&id, ToastInput::Key(Key::Enter)));
    assert_eq!(assert_ready!(answer.poll()), Ok(true));
    assert!(h.manager.is_removing(&id));
}

#[test]
fn test_confirm_cancel_close_and_timeout_resolve_false() {
    let mut h = Harness::new(ManagerConfig::default());

    let mut rx = h.manager.confirm(ConfirmOptions::new("Cancel me")).unwrap();
    let id = h.manager.active()[0].id.clone();
    h.manager.dispatch_input(&id, ToastInput::Action("cancel".into()));
    assert_eq!(rx.try_recv(), Ok(false));

    let mut rx = h.manager.confirm(ConfirmOptions::new("Close me")).unwrap();
    let id = h.manager.active().last().unwrap().id.clone();
    h.manager.dispatch_input(&id, ToastInput::CloseButton);
    assert_eq!(rx.try_recv(), Ok(false));

    let mut rx = h
        .manager
        .confirm(ConfirmOptions::new("Too slow").with_timeout(Duration::from_millis(3000)))
        .unwrap();
    assert!(rx.try_recv().is_err());
    h.advance(3000);
    assert_eq!(rx.try_recv(), Ok(false));
}

#[test]
fn test_loading_flow() {
    let mut h = Harness::new(ManagerConfig::default());
    let loading = h.manager.loading("Uploading").unwrap();
    let id = loading.id().clone();
    assert!(loading.admission().is_created());
    assert_eq!(h.surface.region(&id, Region::Icon).as_deref(), Some("⏳"));
    assert_eq!(h.surface.region(&id, Region::CloseButton), None);

    assert!(loading.update_progress(&mut h.manager, 0.5));
    assert_eq!(h.surface.region(&id, Region::Progress).as_deref(), Some("50%"));
    assert!(loading.update_message(&mut h.manager, "Almost there"));

    h.advance(60_000);
    assert_eq!(h.manager.active_count(), 1);

    assert!(loading.success(&mut h.manager, "Uploaded"));
    let snapshot = h.manager.get(&id).unwrap();
    assert_eq!(snapshot.kind, NotificationType::Success);
    assert!(!snapshot.persistent);
    assert_eq!(h.surface.region(&id, Region::Progress), None);
    assert_eq!(h.surface.region(&id, Region::Icon).as_deref(), Some("✓"));

    h.advance(5000);
    assert!(h.manager.is_removing(&id));
}

#[test]
fn test_loading_cancel() {
    let mut h = Harness::new(ManagerConfig::default());
    let loading = h.manager.loading("Working").unwrap();
    let id = loading.id().clone();
    assert!(loading.cancel(&mut h.manager));
    assert!(h.manager.is_removing(&id));
}

#[test]
fn test_sequence_paces_requests() {
    let mut h = Harness::new(ManagerConfig::default());
    let rx = h
        .manager
        .sequence(
            vec![
                (NotificationType::Info, "one".into()),
                (NotificationType::Info, "two".into()),
                (NotificationType::Success, "three".into()),
            ],
            Duration::from_millis(1000),
        )
        .unwrap();
    let mut done = tokio_test::task::spawn(rx);

    assert_eq!(h.manager.active_count(), 1);
    h.advance(1000);
    assert_eq!(h.manager.active_count(), 2);
    h.advance(1000);
    assert_eq!(h.manager.active_count(), 3);
    assert_pending!(done.poll());

    h.advance(1000);
    assert_eq!(assert_ready!(done.poll()), Ok(()));
}

#[test]
fn test_auto_update_replaces_content() {
    let mut h = Harness::new(ManagerConfig::default());
    let admission = h
        .manager
        .notify_with_auto_update(
            NotificationType::Info,
            NotificationOptions::titled("Sync", "Syncing").with_persistent(true),
            Duration::from_millis(1500),
            NotificationType::Success,
            NotificationOptions::message("Synced").with_persistent(false),
        )
        .unwrap();
    let id = admission.into_id().unwrap();

    h.advance(1500);
    let snapshot = h.manager.get(&id).unwrap();
    assert_eq!(snapshot.kind, NotificationType::Success);
    assert_eq!(snapshot.message, "Synced");

    h.advance(5000);
    assert!(h.manager.is_removing(&id));
}

#[test]
fn test_guarded_notify_shows_fallback() {
    let mut h = Harness::new(ManagerConfig::default());
    h.surface.fail_next_creates(1);
    let id = h.manager.notify_guarded("info", "will fail").unwrap();
    assert_eq!(h.manager.get(&id).unwrap().title, FALLBACK_ERROR_TITLE);
    assert_eq!(h.manager.get(&id).unwrap().kind, NotificationType::Error);

    // A second failure folds into the fallback already on screen
    h.surface.fail_next_creates(1);
    assert_eq!(h.manager.notify_guarded("info", "again"), Some(id.clone()));
    assert_eq!(h.manager.group_count("error:Something went wrong"), Some(2));

    let mut h = Harness::new(ManagerConfig::default());
    h.surface.fail_next_creates(2);
    assert!(h.manager.notify_guarded("info", "fails twice").is_none());
    assert_eq!(h.manager.active_count(), 0);
}

#[test]
fn test_sounds_play_when_enabled() {
    struct CountingPlayer(Arc<AtomicUsize>);
    impl SoundPlayer for CountingPlayer {
        fn play(&mut self, _kind: NotificationType) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let plays = Arc::new(AtomicUsize::new(0));
    let surface = HeadlessSurface::new();
    let mut manager = ToastManager::new(
        config(|c| c.enable_sounds = true),
        Box::new(surface),
        Arc::new(ManualClock::default()),
    )
    .with_sound(Box::new(CountingPlayer(plays.clone())));

    manager.info("ding").unwrap();
    manager.info(NotificationOptions::titled("T", "a")).unwrap();
    manager.info(NotificationOptions::titled("T", "b")).unwrap();
    assert_eq!(plays.load(Ordering::SeqCst), 2);
}

#[test]
fn test_update_config_applies_and_notifies() {
    let mut h = Harness::new(config(|c| c.max_visible = 1));
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = updates.clone();
    h.manager.on(EventKind::ConfigUpdated, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    h.manager.info("a").unwrap();
    h.manager.info("b").unwrap();
    h.manager.info("c").unwrap();
    assert_eq!(h.manager.queued_count(), 2);

    h.manager
        .update_config(ConfigPatch {
            max_visible: Some(3),
            theme: Some("dark".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(h.manager.active_count(), 2);
    assert_eq!(h.surface.theme(), Some(Theme::Dark));
    assert_eq!(updates.load(Ordering::SeqCst), 1);

    h.advance(100);
    assert_eq!(h.manager.active_count(), 3);
    assert_eq!(h.manager.queued_count(), 0);
}

#[test]
fn test_shrinking_capacity_evicts_oldest() {
    let mut h = Harness::new(config(|c| c.max_visible = 3));
    let oldest = created(h.manager.info("1").unwrap());
    h.manager.info("2").unwrap();
    h.manager.info("3").unwrap();

    h.manager
        .update_config(ConfigPatch {
            max_visible: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(h.manager.active_count(), 2);
    assert!(h.manager.get(&oldest).is_none());
}

#[test]
fn test_destroy_tears_everything_down() {
    let mut h = Harness::new(ManagerConfig::default());
    let closed = Arc::new(Mutex::new(Vec::new()));
    let sink = closed.clone();
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();
    h.manager.on(EventKind::Destroyed, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let id = created(
        h.manager
            .info(
                NotificationOptions::message("bye")
                    .with_position(Position::BottomLeft)
                    .with_on_close(move |_, reason| {
                        sink.lock().push(reason);
                        Ok(())
                    }),
            )
            .unwrap(),
    );
    h.manager.destroy();
    h.manager.destroy();

    assert!(h.manager.is_destroyed());
    assert_eq!(*closed.lock(), vec![CloseReason::Destroyed]);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert!(h.surface.mounted().is_empty());
    assert_eq!(h.surface.toast(&id).unwrap().clears, 1);
    assert_eq!(h.manager.pending_timers(), 0);
    assert!(matches!(h.manager.info("late"), Err(ToastError::Destroyed)));
    assert!(h.manager.update_config(ConfigPatch::default()).is_err());
    assert!(!h.manager.remove_by_id(&id, CloseReason::Manual));
}

#[test]
fn test_event_listener_can_unsubscribe() {
    let mut h = Harness::new(ManagerConfig::default());
    let added = Arc::new(AtomicUsize::new(0));
    let counter = added.clone();
    let listener = h.manager.on(EventKind::Added, move |event| {
        assert!(event.notification_id().is_some());
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    h.manager.info("one").unwrap();
    assert!(h.manager.off(listener));
    h.manager.info("two").unwrap();
    assert_eq!(added.load(Ordering::SeqCst), 1);
}
