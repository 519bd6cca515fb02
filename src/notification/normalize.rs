//! Request normalization and text sanitization.
//!
//! Malformed input is never an error here: bad values are coerced or dropped
//! so that admission always works on a clean request.

use std::collections::HashSet;

use ammonia::Builder;
use lazy_static::lazy_static;

use super::types::{Action, NotificationOptions};

lazy_static! {
    /// Allows no tags at all: markup is stripped, text content is kept and escaped
    static ref TEXT_SANITIZER: Builder<'static> = {
        let mut builder = Builder::empty();
        builder.clean_content_tags(["script", "style"].into_iter().collect::<HashSet<&'static str>>());
        builder
    };
}

/// Neutralize markup in user supplied text
pub fn sanitize_text(input: &str) -> String {
    if !input.contains(['<', '>', '&']) {
        return input.to_string();
    }
    TEXT_SANITIZER.clean(input).to_string()
}

/// Clean up a request before admission.
///
/// - free text fields are sanitized
/// - negative durations clamp to zero
/// - progress is clamped to `0.0..=1.0` and NaN is dropped
/// - actions without a usable label are dropped, missing ids are assigned
pub fn normalize_options(mut options: NotificationOptions, next_action_id: &mut u64) -> NotificationOptions {
    options.title = options.title.map(|t| sanitize_text(&t));
    options.message = options.message.map(|m| sanitize_text(&m));
    options.icon = options
        .icon
        .map(|i| sanitize_text(&i))
        .filter(|i| !i.trim().is_empty());

    if let Some(ms) = options.duration_ms {
        if ms < 0 {
            tracing::debug!(duration_ms = ms, "Clamping negative duration to zero");
            options.duration_ms = Some(0);
        }
    }

    options.progress = options
        .progress
        .filter(|p| !p.is_nan())
        .map(|p| p.clamp(0.0, 1.0));

    options.actions = options
        .actions
        .map(|actions| normalize_actions(actions, next_action_id));

    options
}

fn normalize_actions(actions: Vec<Action>, next_action_id: &mut u64) -> Vec<Action> {
    let total = actions.len();
    let cleaned: Vec<Action> = actions
        .into_iter()
        .filter_map(|mut action| {
            let label = sanitize_text(action.label.trim());
            if label.is_empty() {
                return None;
            }
            action.label = label;
            if action.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                *next_action_id += 1;
                action.id = Some(format!("action-{}", next_action_id));
            }
            Some(action)
        })
        .collect();

    if cleaned.len() < total {
        tracing::debug!(
            dropped = total - cleaned.len(),
            "Dropped actions without a usable label"
        );
    }
    cleaned
}

/// Group key for similar notifications; `None` when the title is blank
pub fn group_key(kind: &str, title: Option<&str>) -> Option<String> {
    let title = title?.trim();
    if title.is_empty() || kind.is_empty() {
        return None;
    }
    Some(format!("{}:{}", kind, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Priority;

    #[test]
    fn test_plain_text_is_untouched() {
        assert_eq!(sanitize_text("Build finished (42 files)"), "Build finished (42 files)");
    }

    #[test]
    fn test_markup_is_stripped() {
        assert_eq!(sanitize_text("<b>Saved</b>"), "Saved");
        let cleaned = sanitize_text("<script>alert(1)</script>Hi");
        assert!(!cleaned.contains("<script"));
        assert!(cleaned.contains("Hi"));
        let cleaned = sanitize_text("<img src=x onerror=alert(1)>");
        assert!(!cleaned.contains("onerror"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_text("a < b & <i>c</i>");
        assert_eq!(sanitize_text(&once), once);
    }

    #[test]
    fn test_normalize_clamps_values() {
        let mut counter = 0;
        let options = NotificationOptions {
            duration_ms: Some(-100),
            progress: Some(3.5),
            icon: Some("   ".to_string()),
            priority: Some(Priority::High),
            ..Default::default()
        };
        let normalized = normalize_options(options, &mut counter);
        assert_eq!(normalized.duration_ms, Some(0));
        assert_eq!(normalized.progress, Some(1.0));
        assert_eq!(normalized.icon, None);
        assert_eq!(normalized.priority, Some(Priority::High));
    }

    #[test]
    fn test_normalize_repairs_actions() {
        let mut counter = 0;
        let options = NotificationOptions {
            actions: Some(vec![
                Action::new("Undo", |_| Ok(())),
                Action::new("   ", |_| Ok(())),
                Action::new("Open", |_| Ok(())).with_id("open"),
            ]),
            ..Default::default()
        };
        let actions = normalize_options(options, &mut counter).actions.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id(), "action-1");
        assert_eq!(actions[1].id(), "open");
        assert_eq!(counter, 1);
    }

    #[test]
    fn test_group_key() {
        assert_eq!(group_key("info", Some("T")), Some("info:T".to_string()));
        assert_eq!(group_key("info", Some("  ")), None);
        assert_eq!(group_key("info", None), None);
    }
}
