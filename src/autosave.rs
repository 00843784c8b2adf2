//! One-time persistence of built-in thresholds.
//!
//! When a container has neither saved settings nor thresholds in its own
//! payload, the built-in table is written back once per session so the
//! backend holds an explicit record from then on.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::settings::{ContainerSettings, SavePayload, SettingsStore};
use crate::thresholds::ThresholdSet;

/// Everything the policy looks at.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoSaveInputs<'a> {
    pub site_loaded: bool,
    pub settings_loaded: bool,
    /// Saved record matching the container, if any
    pub saved: Option<&'a ContainerSettings>,
    pub parent_thresholds: Option<&'a ThresholdSet>,
    pub already_auto_saved: bool,
}

/// Whether the defaults must be written back now.
pub fn should_auto_save_defaults(inputs: &AutoSaveInputs<'_>) -> bool {
    let has_saved = inputs.saved.is_some_and(|s| !s.thresholds.is_empty());
    let has_parent = inputs.parent_thresholds.is_some_and(|p| !p.is_empty());

    inputs.site_loaded
        && inputs.settings_loaded
        && !has_saved
        && !has_parent
        && !inputs.already_auto_saved
}

/// Result of one auto-save attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum AutoSaveOutcome {
    Skipped,
    Saved(SavePayload),
    Failed(String),
}

/// Remembers which containers already fired this session.
#[derive(Clone, Debug, Default)]
pub struct AutoSaveTracker {
    fired: HashSet<String>,
}

impl AutoSaveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fired(&self, container: &str) -> bool {
        self.fired.contains(container)
    }

    /// Run the policy for `container` and write `defaults` when it says so.
    ///
    /// The container is marked before the write, so a failed write is
    /// logged and reported but not retried; the next explicit save or
    /// reset covers it.
    pub fn run(
        &mut self,
        container: &str,
        inputs: AutoSaveInputs<'_>,
        defaults: impl FnOnce() -> SavePayload,
        store: &mut dyn SettingsStore,
    ) -> AutoSaveOutcome {
        let inputs = AutoSaveInputs {
            already_auto_saved: inputs.already_auto_saved || self.has_fired(container),
            ..inputs
        };
        if !should_auto_save_defaults(&inputs) {
            return AutoSaveOutcome::Skipped;
        }

        self.fired.insert(container.to_string());
        let payload = defaults();
        if payload.data.thresholds.is_empty() {
            return AutoSaveOutcome::Skipped;
        }

        match store.save(&payload) {
            Ok(()) => {
                info!(container, model = %payload.data.model, "default thresholds persisted");
                AutoSaveOutcome::Saved(payload)
            }
            Err(err) => {
                warn!(container, model = %payload.data.model, error = %err, "persisting default thresholds failed");
                AutoSaveOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ThresholdRegistry;
    use crate::settings::MemorySettingsStore;
    use std::collections::BTreeMap;

    fn ready() -> AutoSaveInputs<'static> {
        AutoSaveInputs {
            site_loaded: true,
            settings_loaded: true,
            ..Default::default()
        }
    }

    fn defaults() -> SavePayload {
        let registry = ThresholdRegistry::builtin();
        SavePayload::new(
            "bd",
            "site-a",
            registry.defaults_for_model("bd"),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_policy_requires_every_condition() {
        assert!(should_auto_save_defaults(&ready()));

        assert!(!should_auto_save_defaults(&AutoSaveInputs {
            site_loaded: false,
            ..ready()
        }));
        assert!(!should_auto_save_defaults(&AutoSaveInputs {
            settings_loaded: false,
            ..ready()
        }));
        assert!(!should_auto_save_defaults(&AutoSaveInputs {
            already_auto_saved: true,
            ..ready()
        }));

        let saved = defaults().to_settings();
        assert!(!should_auto_save_defaults(&AutoSaveInputs {
            saved: Some(&saved),
            ..ready()
        }));

        let parent = ThresholdRegistry::builtin().defaults_for_model("mbt");
        assert!(!should_auto_save_defaults(&AutoSaveInputs {
            parent_thresholds: Some(&parent),
            ..ready()
        }));
    }

    #[test]
    fn test_empty_parent_does_not_block() {
        let parent = ThresholdSet::new();
        assert!(should_auto_save_defaults(&AutoSaveInputs {
            parent_thresholds: Some(&parent),
            ..ready()
        }));
    }

    #[test]
    fn test_fires_once_per_container() {
        let mut tracker = AutoSaveTracker::new();
        let mut store = MemorySettingsStore::new();

        let first = tracker.run("bd-1", ready(), defaults, &mut store);
        assert!(matches!(first, AutoSaveOutcome::Saved(_)));
        let second = tracker.run("bd-1", ready(), defaults, &mut store);
        assert_eq!(second, AutoSaveOutcome::Skipped);
        assert_eq!(store.records().len(), 1);

        let other = tracker.run("bd-2", ready(), defaults, &mut store);
        assert!(matches!(other, AutoSaveOutcome::Saved(_)));
    }

    #[test]
    fn test_failure_is_not_retried() {
        let mut tracker = AutoSaveTracker::new();
        let mut store = MemorySettingsStore::rejecting("503");

        let first = tracker.run("bd-1", ready(), defaults, &mut store);
        assert!(matches!(first, AutoSaveOutcome::Failed(ref reason) if reason.contains("503")));
        assert!(tracker.has_fired("bd-1"));
        assert_eq!(
            tracker.run("bd-1", ready(), defaults, &mut store),
            AutoSaveOutcome::Skipped
        );
    }

    #[test]
    fn test_not_ready_does_not_mark() {
        let mut tracker = AutoSaveTracker::new();
        let mut store = MemorySettingsStore::new();
        let waiting = AutoSaveInputs {
            settings_loaded: false,
            ..ready()
        };
        assert_eq!(
            tracker.run("bd-1", waiting, defaults, &mut store),
            AutoSaveOutcome::Skipped
        );
        assert!(!tracker.has_fired("bd-1"));
    }
}
