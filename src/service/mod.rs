//! Async front end for [`ToastManager`].
//!
//! The manager is a single-owner state machine, so the service runs it inside
//! one tokio task. Callers talk to it through a cloneable [`ToastHandle`]; the
//! task sleeps until the next timer deadline or the next command, whichever
//! comes first.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{Result, ToastError};
use crate::manager::{Admission, ConfirmOptions, ToastEvent, ToastManager};
use crate::notification::{CloseReason, NotificationId, NotificationOptions, NotificationType};

/// Pending commands before callers start waiting
const COMMAND_BUFFER: usize = 256;

/// Events kept for slow subscribers
const EVENT_BUFFER: usize = 256;

type Job = Box<dyn FnOnce(&mut ToastManager) + Send>;

enum Command {
    Exec(Job),
    Shutdown(oneshot::Sender<()>),
}

/// Task that owns a manager and drives its timers
pub struct ToastService {
    manager: ToastManager,
    commands: mpsc::Receiver<Command>,
}

impl ToastService {
    /// Move `manager` onto the runtime and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(mut manager: ToastManager) -> ToastHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let sender = events.clone();
        manager.on_all(move |event| {
            // No subscribers is not an error
            let _ = sender.send(event.clone());
            Ok(())
        });

        let service = ToastService {
            manager,
            commands: rx,
        };
        tokio::spawn(service.run());

        ToastHandle {
            commands: tx,
            events,
        }
    }

    async fn run(mut self) {
        tracing::info!("Toast service started");

        loop {
            let wait = self.manager.next_deadline().map(|deadline| {
                (deadline - self.manager.now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            });
            let timer = async move {
                match wait {
                    Some(wait) => tokio::time::sleep(wait).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Exec(job)) => job(&mut self.manager),
                    Some(Command::Shutdown(ack)) => {
                        tracing::info!("Toast service received shutdown signal");
                        self.manager.destroy();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        tracing::info!("All toast handles dropped");
                        self.manager.destroy();
                        break;
                    }
                },
                _ = timer => {
                    let fired = self.manager.run_due();
                    tracing::trace!(fired = fired, "Ran due timers");
                }
            }
        }

        tracing::info!("Toast service stopped");
    }
}

/// Cloneable handle to a running [`ToastService`]
#[derive(Clone)]
pub struct ToastHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ToastEvent>,
}

impl ToastHandle {
    /// Run `f` against the manager and return its result
    pub async fn with<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ToastManager) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |manager| {
            let _ = tx.send(f(manager));
        });
        self.commands
            .send(Command::Exec(job))
            .await
            .map_err(|_| ToastError::ServiceClosed)?;
        rx.await.map_err(|_| ToastError::ServiceClosed)
    }

    pub async fn notify(
        &self,
        kind: impl Into<NotificationType>,
        options: impl Into<NotificationOptions>,
    ) -> Result<Admission> {
        let kind = kind.into();
        let options = options.into();
        self.with(move |manager| manager.notify(kind, options)).await?
    }

    pub async fn update(&self, id: NotificationId, options: NotificationOptions) -> Result<Option<NotificationId>> {
        self.with(move |manager| manager.update(&id, options)).await
    }

    pub async fn remove(&self, id: NotificationId) -> Result<bool> {
        self.with(move |manager| manager.remove_by_id(&id, CloseReason::Manual))
            .await
    }

    pub async fn clear_all(&self, include_persistent: bool) -> Result<usize> {
        self.with(move |manager| manager.clear_all(include_persistent))
            .await
    }

    /// Ask a question and wait for the answer. A torn down manager answers
    /// `false`.
    pub async fn confirm(&self, options: ConfirmOptions) -> Result<bool> {
        let rx = self.with(move |manager| manager.confirm(options)).await??;
        Ok(rx.await.unwrap_or(false))
    }

    /// Show `items` one after another and wait until the run finished
    pub async fn sequence(
        &self,
        items: Vec<(NotificationType, NotificationOptions)>,
        delay: Duration,
    ) -> Result<()> {
        let rx = self
            .with(move |manager| manager.sequence(items, delay))
            .await??;
        rx.await.map_err(|_| ToastError::ServiceClosed)
    }

    /// Receive every manager event from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.events.subscribe()
    }

    /// Destroy the manager and stop the task. Safe to call more than once.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ToastConfig;
    use crate::manager::EventKind;
    use crate::scheduler::SystemClock;
    use crate::toast::HeadlessSurface;

    fn spawn_fast() -> ToastHandle {
        let config = ToastConfig {
            duration_ms: 100,
            animation_duration_ms: 20,
            ..Default::default()
        }
        .validate();
        let manager = ToastManager::new(config, Box::new(HeadlessSurface::new()), Arc::new(SystemClock));
        ToastService::spawn(manager)
    }

    #[tokio::test]
    async fn test_timers_run_on_the_runtime() {
        let handle = spawn_fast();
        let admission = handle.notify("info", "hello").await.unwrap();
        assert!(admission.is_created());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let count = handle.with(|manager| manager.active_count()).await.unwrap();
        assert_eq!(count, 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let handle = spawn_fast();
        let mut events = handle.subscribe();

        let id = handle
            .notify("success", NotificationOptions::message("saved").with_persistent(true))
            .await
            .unwrap()
            .into_id()
            .unwrap();
        assert!(handle.remove(id.clone()).await.unwrap());

        let added = events.recv().await.unwrap();
        assert_eq!(added.kind(), EventKind::Added);
        let removed = events.recv().await.unwrap();
        assert_eq!(removed.kind(), EventKind::Removed);
        assert_eq!(removed.notification_id(), Some(&id));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_confirm_timeout_answers_false() {
        let handle = spawn_fast();
        let answer = handle
            .confirm(ConfirmOptions::new("Proceed?").with_timeout(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(!answer);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_the_service() {
        let handle = spawn_fast();
        let mut events = handle.subscribe();
        handle.shutdown().await;
        handle.shutdown().await;

        assert_eq!(events.recv().await.unwrap().kind(), EventKind::Destroyed);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.notify("info", "late").await,
            Err(ToastError::ServiceClosed)
        ));
    }
}
