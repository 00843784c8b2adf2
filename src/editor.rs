//! Threshold editing with cascading adjustment.
//!
//! Typing into a level field goes through [`ThresholdEditor::change`],
//! which stores the raw value. Leaving the field goes through
//! [`ThresholdEditor::commit`], which runs [`adjust`] so the band is
//! non-decreasing again.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::Result;
use crate::registry::ThresholdRegistry;
use crate::settings::{SavePayload, SettingsStore};
use crate::thresholds::{LevelKey, Quantity, ThresholdBand, ThresholdSet, LEVEL_COUNT};

/// Set `key` to `value` and clamp neighbours to keep the band ordered.
///
/// Lower levels above `value` are pulled down, higher levels below it are
/// pushed up. Each walk stops at the first present level already in
/// order; absent levels are skipped. A key that does not belong to the
/// band's kind or a non-finite value leaves the band unchanged.
pub fn adjust(band: &ThresholdBand, key: LevelKey, value: f64) -> ThresholdBand {
    let mut next = band.clone();
    let Some(index) = band.kind().index_of(key) else {
        return next;
    };
    if !value.is_finite() {
        return next;
    }
    next.set_at(index, value);

    for slot in (0..index).rev() {
        match next.value_at(slot) {
            Some(level) if level > value => next.set_at(slot, value),
            Some(_) => break,
            None => continue,
        }
    }

    for slot in index + 1..LEVEL_COUNT {
        match next.value_at(slot) {
            Some(level) if level < value => next.set_at(slot, value),
            Some(_) => break,
            None => continue,
        }
    }

    next
}

/// In-memory threshold state of one container.
#[derive(Clone, Debug)]
pub struct ThresholdEditor {
    model: String,
    site: String,
    thresholds: ThresholdSet,
    parameters: BTreeMap<String, f64>,
    dirty: bool,
}

impl ThresholdEditor {
    /// Editor for settings `model`, seeded with the resolved thresholds.
    pub fn new(
        model: impl Into<String>,
        site: impl Into<String>,
        thresholds: ThresholdSet,
        parameters: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            model: model.into(),
            site: site.into(),
            thresholds,
            parameters,
            dirty: false,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    /// Unsaved edits present.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Follow the latest resolution: write target, site and, unless the
    /// operator has unsaved edits, the thresholds.
    pub fn sync(&mut self, model: &str, resolved: &ThresholdSet, site: &str) {
        if self.model != model {
            self.model = model.to_string();
        }
        self.site = site.to_string();
        if !self.dirty && self.thresholds != *resolved {
            self.thresholds = resolved.clone();
        }
    }

    /// Live edit: store the raw value, no cascading.
    pub fn change(&mut self, quantity: Quantity, key: LevelKey, value: f64) -> bool {
        let changed = self.thresholds.band_mut(quantity).set(key, value);
        self.dirty |= changed;
        changed
    }

    /// Committed edit: store the value and cascade neighbours.
    pub fn commit(&mut self, quantity: Quantity, key: LevelKey, value: f64) -> bool {
        if !value.is_finite() || quantity.kind().index_of(key).is_none() {
            return false;
        }
        let band = self.thresholds.band_mut(quantity);
        *band = adjust(band, key, value);
        self.dirty = true;
        true
    }

    pub fn save_payload(&self) -> SavePayload {
        SavePayload::new(
            self.model.clone(),
            self.site.clone(),
            self.thresholds.clone(),
            self.parameters.clone(),
        )
    }

    /// Persist the current values. On failure the values are kept so the
    /// operator can retry.
    pub fn save(&mut self, store: &mut dyn SettingsStore) -> Result<SavePayload> {
        let payload = self.save_payload();
        match store.save(&payload) {
            Ok(()) => {
                self.dirty = false;
                info!(model = %self.model, site = %self.site, "thresholds saved");
                Ok(payload)
            }
            Err(err) => {
                warn!(model = %self.model, error = %err, "saving thresholds failed");
                Err(err)
            }
        }
    }

    /// Restore the built-in thresholds and persist them.
    pub fn reset(
        &mut self,
        registry: &ThresholdRegistry,
        store: &mut dyn SettingsStore,
    ) -> Result<SavePayload> {
        self.thresholds = registry.defaults_for_model(&self.model);
        self.dirty = true;
        self.save(store)
    }
}
