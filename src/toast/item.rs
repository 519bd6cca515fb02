use crate::notification::{sanitize_text, Action, CloseReason};

use super::{Key, Phase, Region, Renderable, ToastFields, ToastInput, ToastSignal};

/// Where a [`ToastItem`] draws its regions
pub trait RegionSink: Send {
    /// Replace one region; `None` removes it from the tree
    fn draw(&mut self, region: Region, content: Option<String>);

    fn phase(&mut self, phase: Phase);

    /// Drop every region
    fn clear(&mut self);
}

#[derive(Debug, Clone)]
struct ActionButton {
    id: String,
    label: String,
    primary: bool,
}

/// Reactive toast component.
///
/// Keeps the last rendered fields and redraws only the regions whose inputs
/// changed. All text passes through the sanitizer before reaching the sink.
pub struct ToastItem<S: RegionSink> {
    sink: S,
    current: Option<ToastFields>,
    actions: Vec<ActionButton>,
    phase: Option<Phase>,
    detached: bool,
}

impl<S: RegionSink> ToastItem<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            current: None,
            actions: Vec::new(),
            phase: None,
            detached: false,
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn fields(&self) -> Option<&ToastFields> {
        self.current.as_ref()
    }

    fn region_content(fields: &ToastFields, region: Region) -> Option<String> {
        match region {
            Region::Frame => Some(format!(
                "type={} visible={} persistent={}",
                fields.kind, fields.visible, fields.persistent
            )),
            Region::Icon => Some(
                fields
                    .icon
                    .clone()
                    .unwrap_or_else(|| fields.kind.default_icon().to_string()),
            ),
            Region::Title => Some(fields.title.clone()).filter(|t| !t.is_empty()),
            Region::Message => Some(fields.message.clone()).filter(|m| !m.is_empty()),
            Region::CloseButton => fields.show_close_button.then(|| "×".to_string()),
            Region::Progress => fields
                .progress
                .map(|p| format!("{:.0}%", p.clamp(0.0, 1.0) * 100.0)),
            Region::Actions => None,
        }
    }

    /// Regions whose content depends on fields that differ
    fn changed_regions(prev: Option<&ToastFields>, next: &ToastFields) -> Vec<Region> {
        let Some(prev) = prev else {
            return vec![
                Region::Frame,
                Region::Icon,
                Region::Title,
                Region::Message,
                Region::CloseButton,
                Region::Progress,
            ];
        };

        let mut regions = Vec::new();
        if prev.kind != next.kind || prev.visible != next.visible || prev.persistent != next.persistent {
            regions.push(Region::Frame);
        }
        if prev.kind != next.kind || prev.icon != next.icon {
            regions.push(Region::Icon);
        }
        if prev.title != next.title {
            regions.push(Region::Title);
        }
        if prev.message != next.message {
            regions.push(Region::Message);
        }
        if prev.show_close_button != next.show_close_button {
            regions.push(Region::CloseButton);
        }
        if prev.progress != next.progress {
            regions.push(Region::Progress);
        }
        regions
    }

    fn draw_actions(&mut self) {
        let content = if self.actions.is_empty() {
            None
        } else {
            Some(
                self.actions
                    .iter()
                    .map(|a| {
                        if a.primary {
                            format!("[{}]*", a.label)
                        } else {
                            format!("[{}]", a.label)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        };
        self.sink.draw(Region::Actions, content);
    }
}

impl<S: RegionSink> Renderable for ToastItem<S> {
    fn render(&mut self, fields: &ToastFields) {
        if self.detached {
            return;
        }

        let mut next = fields.clone();
        next.title = sanitize_text(&next.title);
        next.message = sanitize_text(&next.message);
        next.icon = next.icon.map(|i| sanitize_text(&i));

        for region in Self::changed_regions(self.current.as_ref(), &next) {
            self.sink.draw(region, Self::region_content(&next, region));
        }
        self.current = Some(next);
    }

    fn set_actions(&mut self, actions: &[Action]) {
        if self.detached {
            return;
        }
        self.actions = actions
            .iter()
            .filter(|a| !a.id().is_empty())
            .map(|a| ActionButton {
                id: a.id().to_string(),
                label: sanitize_text(&a.label),
                primary: a.primary,
            })
            .collect();
        self.draw_actions();
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.detached || self.phase == Some(phase) {
            return;
        }
        self.phase = Some(phase);
        self.sink.phase(phase);
    }

    fn handle_input(&mut self, input: ToastInput) -> Option<ToastSignal> {
        if self.detached {
            return None;
        }
        let fields = self.current.as_ref()?;

        match input {
            ToastInput::CloseButton => fields
                .show_close_button
                .then_some(ToastSignal::CloseRequested(CloseReason::CloseButton)),
            ToastInput::Click => (!fields.persistent)
                .then_some(ToastSignal::CloseRequested(CloseReason::Click)),
            ToastInput::Key(Key::Escape) => Some(ToastSignal::CloseRequested(CloseReason::Keyboard)),
            ToastInput::Key(Key::Enter) => self
                .actions
                .iter()
                .find(|a| a.primary)
                .map(|a| ToastSignal::ActionInvoked(a.id.clone())),
            ToastInput::Key(Key::Other(_)) => None,
            ToastInput::Action(id) => self
                .actions
                .iter()
                .any(|a| a.id == id)
                .then_some(ToastSignal::ActionInvoked(id)),
        }
    }

    fn teardown(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        self.actions.clear();
        self.current = None;
        self.sink.clear();
    }
}
