//! Application state and logic for coolwatch.
//!
//! This module contains the main [`App`] struct which coordinates snapshot
//! polling, threshold resolution, alarm evaluation, operator edits,
//! persistence and logging.

use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::path::Path;

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alarm::{self, evaluate_container, AlarmState, Container, ContainerEvaluation, SoundConsent};
use crate::autosave::{AutoSaveInputs, AutoSaveOutcome, AutoSaveTracker};
use crate::config::Config;
use crate::editor::ThresholdEditor;
use crate::error::Result;
use crate::registry::{find_saved, persistence_model, ThresholdRegistry, ThresholdSource};
use crate::settings::{
    ContainerSettings, JsonFileSettingsStore, MemorySettingsStore, SavePayload, SettingsStore,
};
use crate::snapshot::{read_snapshot, SiteSnapshot};
use crate::thresholds::{LevelKey, Quantity, ThresholdSet};

/// Severity of an operator notification.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Non-blocking message shown to the operator.
#[derive(Clone, Debug)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Local time, `HH:MM:SS`
    pub time: String,
    /// Position in the session, starting at 1; never reused
    pub seq: u64,
}

/// Latest evaluation of one container.
#[derive(Clone, Debug)]
pub struct ContainerView {
    pub container: Container,
    /// Where the resolved thresholds came from
    pub source: ThresholdSource,
    /// Active thresholds (unsaved edits included)
    pub thresholds: ThresholdSet,
    /// Unsaved operator edits present
    pub edited: bool,
    pub evaluation: ContainerEvaluation,
}

/// One CSV row per container per tick.
#[derive(Serialize)]
struct AlarmLogRow<'a> {
    timestamp: i64,
    datetime: &'a str,
    site: &'a str,
    container: &'a str,
    model: &'a str,
    status: &'static str,
    threshold_source: &'static str,
    worst_severity: &'static str,
    should_flash: bool,
    is_critically_high: bool,
    channels: String,
}

/// Main application state.
pub struct App {
    /// Application configuration from CLI
    pub config: Config,

    /// Built-in threshold tables
    pub registry: ThresholdRegistry,

    /// Settings backend
    store: Box<dyn SettingsStore>,

    /// Records returned by the settings query
    saved: Vec<ContainerSettings>,

    /// Settings query has completed
    settings_loaded: bool,

    /// Site name from the last snapshot
    pub site: String,

    site_loaded: bool,

    /// Per-container evaluation, snapshot order
    pub views: Vec<ContainerView>,

    /// In-memory thresholds per container name
    editors: BTreeMap<String, ThresholdEditor>,

    autosave: AutoSaveTracker,

    /// Recent notifications, newest last
    pub notifications: VecDeque<Notification>,

    /// CSV writer for the alarm log
    csv_writer: Option<csv::Writer<File>>,

    /// Audible alarm consent for this session
    pub consent: SoundConsent,

    /// Time of the last successful snapshot read
    pub last_update: Option<String>,

    last_snapshot_error: Option<String>,
    last_settings_error: Option<String>,

    /// Notifications raised this session, evicted ones included
    notified_total: u64,
}

impl App {
    /// Create a new application instance with the store named by the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV file cannot be opened.
    pub fn new(config: Config) -> Result<Self> {
        let store: Box<dyn SettingsStore> = match &config.settings_file {
            Some(path) => Box::new(JsonFileSettingsStore::new(path)),
            None => Box::new(MemorySettingsStore::new()),
        };
        Self::with_store(config, store)
    }

    /// Create a new application instance backed by `store`.
    pub fn with_store(config: Config, store: Box<dyn SettingsStore>) -> Result<Self> {
        // Append mode, header only for a new file
        let csv_exists = Path::new(&config.csv_file).exists();
        let csv_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&config.csv_file)?;
        let csv_writer = csv::WriterBuilder::new()
            .has_headers(!csv_exists)
            .from_writer(csv_file);

        let consent = if config.sound_consent {
            SoundConsent::Granted
        } else {
            SoundConsent::Pending
        };
        let history_size = config.history_size;

        Ok(Self {
            config,
            registry: ThresholdRegistry::builtin(),
            store,
            saved: Vec::new(),
            settings_loaded: false,
            site: String::new(),
            site_loaded: false,
            views: Vec::new(),
            editors: BTreeMap::new(),
            autosave: AutoSaveTracker::new(),
            notifications: VecDeque::with_capacity(history_size),
            csv_writer: Some(csv_writer),
            consent,
            last_update: None,
            last_snapshot_error: None,
            last_settings_error: None,
            notified_total: 0,
        })
    }

    /// Poll once: settings query (until it succeeds), snapshot, evaluation
    /// and alarm log.
    pub fn tick(&mut self) -> Result<()> {
        self.load_settings();

        match read_snapshot(Path::new(&self.config.snapshot)) {
            Ok(snapshot) => {
                self.last_snapshot_error = None;
                self.apply_snapshot(snapshot);
                self.log_views()?;
            }
            Err(err) => {
                let reason = err.to_string();
                if self.last_snapshot_error.as_deref() != Some(reason.as_str()) {
                    warn!(path = %self.config.snapshot, error = %reason, "reading snapshot failed");
                    self.notify(
                        NotificationLevel::Error,
                        format!("Snapshot unavailable: {reason}"),
                    );
                    self.last_snapshot_error = Some(reason);
                }
            }
        }

        Ok(())
    }

    /// Run the settings query if it has not completed yet.
    pub fn load_settings(&mut self) {
        if self.settings_loaded {
            return;
        }
        match self.store.load() {
            Ok(records) => {
                info!(records = records.len(), "container settings loaded");
                self.saved = records;
                self.settings_loaded = true;
                self.last_settings_error = None;
            }
            Err(err) => {
                let reason = err.to_string();
                if self.last_settings_error.as_deref() != Some(reason.as_str()) {
                    warn!(error = %reason, "loading container settings failed");
                    self.notify(
                        NotificationLevel::Error,
                        format!("Container settings unavailable: {reason}"),
                    );
                    self.last_settings_error = Some(reason);
                }
            }
        }
    }

    /// Resolve, auto-save and evaluate every container of a snapshot.
    pub fn apply_snapshot(&mut self, snapshot: SiteSnapshot) {
        self.site_loaded = snapshot.site_loaded();
        self.site = snapshot.site;
        self.last_update = Some(Local::now().format("%H:%M:%S").to_string());

        let mut views = Vec::with_capacity(snapshot.containers.len());
        for container in snapshot.containers {
            self.auto_save_defaults(&container);

            let resolved = self.registry.resolve(
                &self.saved,
                container.thresholds.as_ref(),
                &container.model,
            );
            let parameters = find_saved(&self.saved, &container.model)
                .map(|s| s.parameters.clone())
                .unwrap_or_default();
            let write_model = resolved.write_model(&container.model);
            let editor = self
                .editors
                .entry(container.name.clone())
                .or_insert_with(|| {
                    ThresholdEditor::new(
                        write_model.clone(),
                        self.site.clone(),
                        resolved.set.clone(),
                        parameters,
                    )
                });
            editor.sync(&write_model, &resolved.set, &self.site);

            let thresholds = editor.thresholds().clone();
            let evaluation = evaluate_container(&container, &thresholds);
            debug!(
                container = %container.name,
                source = resolved.source.as_str(),
                flash = evaluation.state.should_flash,
                critical = evaluation.state.is_critically_high,
                "container evaluated"
            );
            views.push(ContainerView {
                edited: editor.is_dirty(),
                container,
                source: resolved.source,
                thresholds,
                evaluation,
            });
        }
        self.views = views;
    }

    fn auto_save_defaults(&mut self, container: &Container) {
        let inputs = AutoSaveInputs {
            site_loaded: self.site_loaded,
            settings_loaded: self.settings_loaded,
            saved: find_saved(&self.saved, &container.model),
            parent_thresholds: container.thresholds.as_ref(),
            already_auto_saved: false,
        };
        let registry = &self.registry;
        let site = &self.site;
        let defaults = || {
            SavePayload::new(
                persistence_model(&container.model),
                site.clone(),
                registry.defaults_for_model(&container.model),
                BTreeMap::new(),
            )
        };

        match self
            .autosave
            .run(&container.name, inputs, defaults, self.store.as_mut())
        {
            AutoSaveOutcome::Skipped => {}
            AutoSaveOutcome::Saved(payload) => {
                self.remember(payload.to_settings());
                self.notify(
                    NotificationLevel::Info,
                    format!("Default thresholds saved for {}", payload.data.model),
                );
            }
            AutoSaveOutcome::Failed(reason) => self.notify(
                NotificationLevel::Error,
                format!("Saving default thresholds for {} failed: {reason}", container.name),
            ),
        }
    }

    /// Keep the local copy of the settings query in step with a write.
    fn remember(&mut self, record: ContainerSettings) {
        match self.saved.iter_mut().find(|r| r.model == record.model) {
            Some(existing) => *existing = record,
            None => self.saved.push(record),
        }
    }

    /// Editor of the container at `index`.
    pub fn editor(&self, index: usize) -> Option<&ThresholdEditor> {
        let view = self.views.get(index)?;
        self.editors.get(&view.container.name)
    }

    fn editor_mut(&mut self, index: usize) -> Option<&mut ThresholdEditor> {
        let view = self.views.get(index)?;
        self.editors.get_mut(&view.container.name)
    }

    /// Live edit of one level, without cascading.
    pub fn change_threshold(
        &mut self,
        index: usize,
        quantity: Quantity,
        key: LevelKey,
        value: f64,
    ) -> bool {
        let changed = self
            .editor_mut(index)
            .is_some_and(|e| e.change(quantity, key, value));
        if changed {
            self.refresh_view(index);
        }
        changed
    }

    /// Committed edit of one level, cascading neighbours.
    pub fn commit_threshold(
        &mut self,
        index: usize,
        quantity: Quantity,
        key: LevelKey,
        value: f64,
    ) -> bool {
        let committed = self
            .editor_mut(index)
            .is_some_and(|e| e.commit(quantity, key, value));
        if committed {
            self.refresh_view(index);
        }
        committed
    }

    /// Persist the thresholds of the container at `index`.
    pub fn save_thresholds(&mut self, index: usize) {
        let Some(name) = self.views.get(index).map(|v| v.container.name.clone()) else {
            return;
        };
        let Some(editor) = self.editors.get_mut(&name) else {
            return;
        };
        let result = editor.save(self.store.as_mut());
        self.finish_write(index, &name, "Thresholds saved", result);
    }

    /// Restore and persist the built-in thresholds of the container at
    /// `index`.
    pub fn reset_thresholds(&mut self, index: usize) {
        let Some(name) = self.views.get(index).map(|v| v.container.name.clone()) else {
            return;
        };
        let Some(editor) = self.editors.get_mut(&name) else {
            return;
        };
        let result = editor.reset(&self.registry, self.store.as_mut());
        self.finish_write(index, &name, "Thresholds reset", result);
    }

    fn finish_write(&mut self, index: usize, name: &str, done: &str, result: Result<SavePayload>) {
        match result {
            Ok(payload) => {
                self.remember(payload.to_settings());
                self.notify(
                    NotificationLevel::Info,
                    format!("{done} for {}", payload.data.model),
                );
            }
            Err(err) => self.notify(
                NotificationLevel::Error,
                format!("{done} failed for {name}: {err}"),
            ),
        }
        self.refresh_view(index);
    }

    /// Re-evaluate one container against its editor's thresholds.
    fn refresh_view(&mut self, index: usize) {
        let Some(view) = self.views.get_mut(index) else {
            return;
        };
        let Some(editor) = self.editors.get(&view.container.name) else {
            return;
        };
        view.thresholds = editor.thresholds().clone();
        view.edited = editor.is_dirty();
        view.evaluation = evaluate_container(&view.container, &view.thresholds);
    }

    pub fn notify(&mut self, level: NotificationLevel, message: String) {
        if self.notifications.len() >= self.config.history_size.max(1) {
            self.notifications.pop_front();
        }
        self.notified_total += 1;
        self.notifications.push_back(Notification {
            level,
            message,
            time: Local::now().format("%H:%M:%S").to_string(),
            seq: self.notified_total,
        });
    }

    /// Sequence number of the latest notification, 0 before the first.
    pub fn notified_total(&self) -> u64 {
        self.notified_total
    }

    /// Retained notifications raised after `seq`.
    pub fn notifications_after(&self, seq: u64) -> impl Iterator<Item = &Notification> + '_ {
        self.notifications.iter().filter(move |n| n.seq > seq)
    }

    pub fn alarm_states(&self) -> Vec<AlarmState> {
        self.views.iter().map(|v| v.evaluation.state).collect()
    }

    /// Whether the audible alarm should be playing.
    pub fn should_beep(&self) -> bool {
        alarm::should_beep(&self.alarm_states(), self.consent)
    }

    pub fn flashing_count(&self) -> usize {
        self.views
            .iter()
            .filter(|v| v.evaluation.state.should_flash)
            .count()
    }

    pub fn critical_count(&self) -> usize {
        self.views
            .iter()
            .filter(|v| v.evaluation.state.is_critically_high)
            .count()
    }

    pub fn settings_loaded(&self) -> bool {
        self.settings_loaded
    }

    pub fn saved_settings(&self) -> &[ContainerSettings] {
        &self.saved
    }

    /// Append the current views to the CSV alarm log.
    fn log_views(&mut self) -> Result<()> {
        let Some(writer) = self.csv_writer.as_mut() else {
            return Ok(());
        };
        let now = Utc::now();
        let datetime = now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        for view in &self.views {
            let channels = view
                .evaluation
                .channels
                .iter()
                .map(|c| match c.value {
                    Some(v) => format!("{}={:.2}:{}", c.label, v, c.classification.severity),
                    None => format!("{}=-:{}", c.label, c.classification.severity),
                })
                .collect::<Vec<_>>()
                .join(";");
            writer.serialize(AlarmLogRow {
                timestamp: now.timestamp(),
                datetime: &datetime,
                site: &self.site,
                container: &view.container.name,
                model: &view.container.model,
                status: view.container.status.as_str(),
                threshold_source: view.source.as_str(),
                worst_severity: view.evaluation.worst_severity().as_str(),
                should_flash: view.evaluation.state.should_flash,
                is_critically_high: view.evaluation.state.is_critically_high,
                channels,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}
