use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{Position, Theme};
use crate::error::{Result, ToastError};
use crate::notification::NotificationId;

use super::item::{RegionSink, ToastItem};
use super::{Phase, Region, Renderable};

/// The screen the manager places toasts on.
///
/// Containers are mounted once per position and only unmounted on teardown.
pub trait Surface: Send {
    fn mount_container(&mut self, position: Position) -> Result<()>;

    fn unmount_container(&mut self, position: Position);

    /// Build an unattached toast for `id`
    fn create_item(&mut self, id: &NotificationId) -> Result<Box<dyn Renderable>>;

    fn attach(&mut self, position: Position, id: &NotificationId);

    fn detach(&mut self, position: Position, id: &NotificationId);

    fn set_theme(&mut self, _theme: Theme) {}
}

/// Render record of one toast in a [`HeadlessSurface`]
#[derive(Debug, Clone, Default)]
pub struct HeadlessToast {
    pub regions: BTreeMap<Region, String>,
    pub renders: HashMap<Region, usize>,
    pub phase: Option<Phase>,
    pub clears: usize,
}

#[derive(Debug, Default)]
struct HeadlessState {
    containers: BTreeMap<Position, Vec<NotificationId>>,
    toasts: HashMap<NotificationId, HeadlessToast>,
    theme: Option<Theme>,
    failing_creates: usize,
}

/// In-memory surface.
///
/// Useful for tests, server-side rendering and the demo binary. Clones share
/// state, so a handle kept by the caller sees everything the manager does.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids attached to a container, in display order
    pub fn container(&self, position: Position) -> Vec<NotificationId> {
        self.state
            .lock()
            .containers
            .get(&position)
            .cloned()
            .unwrap_or_default()
    }

    pub fn mounted(&self) -> Vec<Position> {
        self.state.lock().containers.keys().copied().collect()
    }

    pub fn toast(&self, id: &NotificationId) -> Option<HeadlessToast> {
        self.state.lock().toasts.get(id).cloned()
    }

    pub fn region(&self, id: &NotificationId, region: Region) -> Option<String> {
        self.state
            .lock()
            .toasts
            .get(id)
            .and_then(|t| t.regions.get(&region).cloned())
    }

    pub fn render_count(&self, id: &NotificationId, region: Region) -> usize {
        self.state
            .lock()
            .toasts
            .get(id)
            .and_then(|t| t.renders.get(&region).copied())
            .unwrap_or(0)
    }

    pub fn phase(&self, id: &NotificationId) -> Option<Phase> {
        self.state.lock().toasts.get(id).and_then(|t| t.phase)
    }

    pub fn theme(&self) -> Option<Theme> {
        self.state.lock().theme
    }

    /// Make the next `count` item creations fail
    pub fn fail_next_creates(&self, count: usize) {
        self.state.lock().failing_creates = count;
    }
}

impl Surface for HeadlessSurface {
    fn mount_container(&mut self, position: Position) -> Result<()> {
        let mut state = self.state.lock();
        state.containers.entry(position).or_default();
        tracing::debug!(position = %position, "Container mounted");
        Ok(())
    }

    fn unmount_container(&mut self, position: Position) {
        self.state.lock().containers.remove(&position);
        tracing::debug!(position = %position, "Container unmounted");
    }

    fn create_item(&mut self, id: &NotificationId) -> Result<Box<dyn Renderable>> {
        let mut state = self.state.lock();
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(ToastError::Render(format!("cannot create toast {}", id)));
        }
        state.toasts.insert(id.clone(), HeadlessToast::default());
        drop(state);

        let sink = HeadlessSink {
            id: id.clone(),
            state: self.state.clone(),
        };
        Ok(Box::new(ToastItem::new(sink)))
    }

    fn attach(&mut self, position: Position, id: &NotificationId) {
        let mut state = self.state.lock();
        let container = state.containers.entry(position).or_default();
        container.retain(|existing| existing != id);
        // Newest toast sits closest to the screen edge
        if position.is_bottom() {
            container.push(id.clone());
        } else {
            container.insert(0, id.clone());
        }
    }

    fn detach(&mut self, position: Position, id: &NotificationId) {
        if let Some(container) = self.state.lock().containers.get_mut(&position) {
            container.retain(|existing| existing != id);
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.state.lock().theme = Some(theme);
    }
}

/// Sink writing one toast's regions into the shared headless state
pub struct HeadlessSink {
    id: NotificationId,
    state: Arc<Mutex<HeadlessState>>,
}

impl RegionSink for HeadlessSink {
    fn draw(&mut self, region: Region, content: Option<String>) {
        let mut state = self.state.lock();
        let toast = state.toasts.entry(self.id.clone()).or_default();
        *toast.renders.entry(region).or_insert(0) += 1;
        match content {
            Some(content) => {
                tracing::trace!(notification_id = %self.id, region = %region, content = %content, "draw");
                toast.regions.insert(region, content);
            }
            None => {
                toast.regions.remove(&region);
            }
        }
    }

    fn phase(&mut self, phase: Phase) {
        let mut state = self.state.lock();
        state.toasts.entry(self.id.clone()).or_default().phase = Some(phase);
    }

    fn clear(&mut self) {
        let mut state = self.state.lock();
        let toast = state.toasts.entry(self.id.clone()).or_default();
        toast.regions.clear();
        toast.clears += 1;
    }
}
