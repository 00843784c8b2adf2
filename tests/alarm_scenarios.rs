//! End-to-end dashboard scenarios: snapshot on disk, settings file on disk,
//! one `App` polling them.

use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use coolwatch::alarm::SoundConsent;
use coolwatch::app::{App, NotificationLevel};
use coolwatch::config::Config;
use coolwatch::registry::ThresholdSource;
use coolwatch::settings::{ContainerSettings, MemorySettingsStore, SettingsStore};
use coolwatch::thresholds::{LevelKey, Quantity, Severity};

fn config(dir: &Path, settings_file: bool) -> Config {
    Config {
        snapshot: dir.join("site.json").to_string_lossy().into_owned(),
        settings_file: settings_file.then(|| dir.join("settings.json").to_string_lossy().into_owned()),
        interval: 1,
        csv_file: dir.join("alarms.csv").to_string_lossy().into_owned(),
        history_size: 50,
        headless: true,
        sound_consent: false,
        log_file: None,
    }
}

fn write_snapshot(dir: &Path, containers: serde_json::Value) {
    let snapshot = json!({"site": "site-a", "containers": containers});
    fs::write(dir.join("site.json"), snapshot.to_string()).unwrap();
}

fn microbt(water: f64, pump: bool) -> serde_json::Value {
    json!([{
        "name": "mbt-01",
        "type": "container-mbt-wonder",
        "status": "running",
        "last": {"cdu": {"unit_inlet_temp_t2": water, "circulating_pump": pump}}
    }])
}

fn read_settings(dir: &Path) -> Vec<ContainerSettings> {
    let content = fs::read_to_string(dir.join("settings.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn water_severity(app: &App) -> Severity {
    app.views[0].evaluation.channels[0].classification.severity
}

#[test]
fn microbt_water_temperature_walk() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(config(dir.path(), true)).unwrap();

    write_snapshot(dir.path(), microbt(34.0, true));
    app.tick().unwrap();
    // Defaults are written back before resolution, so they come back saved
    assert_eq!(app.views[0].source, ThresholdSource::Saved);
    assert_eq!(water_severity(&app), Severity::Normal);
    assert_eq!(app.flashing_count(), 0);

    write_snapshot(dir.path(), microbt(37.0, true));
    app.tick().unwrap();
    assert_eq!(water_severity(&app), Severity::AlarmHigh);
    assert_eq!(app.flashing_count(), 1);
    assert_eq!(app.critical_count(), 0);

    write_snapshot(dir.path(), microbt(39.0, true));
    app.tick().unwrap();
    assert_eq!(water_severity(&app), Severity::CriticalHigh);
    assert_eq!(app.critical_count(), 1);
    assert!(!app.should_beep(), "no beep before consent");
    app.consent = SoundConsent::Granted;
    assert!(app.should_beep());

    write_snapshot(dir.path(), microbt(25.0, true));
    app.tick().unwrap();
    assert_eq!(water_severity(&app), Severity::AlarmLow);

    write_snapshot(dir.path(), microbt(24.9, true));
    app.tick().unwrap();
    assert_eq!(water_severity(&app), Severity::CriticalLow);
    assert_eq!(app.flashing_count(), 1);
    assert!(!app.should_beep(), "low side never beeps");

    write_snapshot(dir.path(), microbt(60.0, false));
    app.tick().unwrap();
    assert_eq!(water_severity(&app), Severity::Neutral);
    assert_eq!(app.flashing_count(), 0);
}

#[test]
fn defaults_are_persisted_once() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(config(dir.path(), true)).unwrap();

    write_snapshot(dir.path(), microbt(34.0, true));
    app.tick().unwrap();

    let records = read_settings(dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].model, "mbt");
    assert!(records[0].thresholds.get(Quantity::WaterTemperature).is_some());
    assert!(app
        .notifications
        .iter()
        .any(|n| n.level == NotificationLevel::Info && n.message.contains("mbt")));

    // The saved record now wins and nothing is written again
    fs::remove_file(dir.path().join("settings.json")).unwrap();
    app.tick().unwrap();
    assert_eq!(app.views[0].source, ThresholdSource::Saved);
    assert!(!dir.path().join("settings.json").exists());
}

#[test]
fn parent_thresholds_block_auto_save() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(config(dir.path(), true)).unwrap();

    write_snapshot(
        dir.path(),
        json!([{
            "name": "bd-01",
            "type": "container-bd-d40-a1346",
            "status": "running",
            "last": {"tank1_bar": 4.5},
            "thresholds": {"tankPressure": {"criticalLow": 1, "alarmLow": 1.5, "normal": 2, "alarmHigh": 5, "criticalHigh": 6}}
        }]),
    );
    app.tick().unwrap();

    assert_eq!(app.views[0].source, ThresholdSource::Parent);
    assert!(!dir.path().join("settings.json").exists());
    let tank1 = app.views[0]
        .evaluation
        .channels
        .iter()
        .find(|c| c.label == "Tank1")
        .unwrap();
    assert_eq!(tank1.classification.severity, Severity::Normal);
}

#[test]
fn failed_auto_save_is_reported_once() {
    let dir = TempDir::new().unwrap();
    let store: Box<dyn SettingsStore> = Box::new(MemorySettingsStore::rejecting("backend down"));
    let mut app = App::with_store(config(dir.path(), false), store).unwrap();

    write_snapshot(dir.path(), microbt(34.0, true));
    app.tick().unwrap();
    app.tick().unwrap();

    let failures: Vec<_> = app
        .notifications
        .iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].message.contains("backend down"));
    // Defaults still drive classification
    assert_eq!(app.views[0].source, ThresholdSource::Default);
    assert_eq!(water_severity(&app), Severity::Normal);
}

#[test]
fn stopped_container_never_alarms() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(config(dir.path(), false)).unwrap();
    app.consent = SoundConsent::Granted;

    write_snapshot(
        dir.path(),
        json!([{
            "name": "imm-01",
            "type": "container-as-immersion",
            "status": "stopped",
            "last": {"supply_liquid_temp": 90.0}
        }]),
    );
    app.tick().unwrap();

    assert!(!app.views[0].evaluation.state.should_flash);
    assert!(!app.should_beep());
}

#[test]
fn edit_commit_and_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let store: Box<dyn SettingsStore> = Box::new(MemorySettingsStore::new());
    let mut app = App::with_store(config(dir.path(), false), store).unwrap();

    write_snapshot(
        dir.path(),
        json!([{
            "name": "bd-01",
            "type": "container-bd-d40-a1346",
            "status": "running",
            "last": {"cooling_system": {"oil_pump": [{"cold_temp_c": 44.0, "enabled": true}]}}
        }]),
    );
    app.tick().unwrap();
    assert_eq!(app.views[0].evaluation.channels[0].classification.severity, Severity::Normal);

    // Live edit: raw value, band may be out of order
    assert!(app.change_threshold(0, Quantity::OilTemperature, LevelKey::CriticalLow, 45.0));
    let band = app.views[0].thresholds.get(Quantity::OilTemperature).unwrap();
    assert!(!band.is_ordered());

    // Commit cascades
    assert!(app.commit_threshold(0, Quantity::OilTemperature, LevelKey::CriticalLow, 45.0));
    let band = app.views[0].thresholds.get(Quantity::OilTemperature).unwrap();
    let values: Vec<f64> = band.iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec![45.0, 45.0, 45.0, 46.0, 48.0]);
    assert!(app.views[0].edited);
    assert_eq!(
        app.views[0].evaluation.channels[0].classification.severity,
        Severity::CriticalLow
    );

    // Unsaved edits survive a poll
    app.tick().unwrap();
    assert!(app.views[0].edited);

    app.save_thresholds(0);
    assert!(!app.views[0].edited);
    let record = app
        .saved_settings()
        .iter()
        .find(|r| r.model == "bd")
        .unwrap();
    assert_eq!(
        record.thresholds.get(Quantity::OilTemperature).unwrap().get(LevelKey::Alert),
        Some(45.0)
    );

    app.reset_thresholds(0);
    let band = app.views[0].thresholds.get(Quantity::OilTemperature).unwrap();
    assert_eq!(band.get(LevelKey::CriticalLow), Some(30.0));
}

#[test]
fn missing_snapshot_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(config(dir.path(), false)).unwrap();

    app.tick().unwrap();
    app.tick().unwrap();

    assert!(app.views.is_empty());
    let errors = app
        .notifications
        .iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .count();
    assert_eq!(errors, 1);
}

#[test]
fn alarm_log_is_appended() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(config(dir.path(), false)).unwrap();

    write_snapshot(dir.path(), microbt(39.5, true));
    app.tick().unwrap();
    app.tick().unwrap();

    let mut reader = csv::Reader::from_path(dir.path().join("alarms.csv")).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    let headers = reader.headers().unwrap().clone();
    let severity = headers.iter().position(|h| h == "worst_severity").unwrap();
    assert_eq!(&rows[0][severity], "criticalHigh");
}

#[test]
fn saved_edit_survives_poll_with_raw_model_record() {
    let dir = TempDir::new().unwrap();
    let registry = coolwatch::registry::ThresholdRegistry::builtin();
    let record = ContainerSettings {
        model: "container-bd-d40-a1346".to_string(),
        thresholds: registry.defaults_for_model("bd"),
        parameters: Default::default(),
    };
    let store: Box<dyn SettingsStore> = Box::new(MemorySettingsStore::with_records(vec![record]));
    let mut app = App::with_store(config(dir.path(), false), store).unwrap();

    write_snapshot(
        dir.path(),
        json!([{
            "name": "bd-01",
            "type": "container-bd-d40-a1346",
            "status": "running",
            "last": {"cooling_system": {"oil_pump": [{"cold_temp_c": 44.0}]}}
        }]),
    );
    app.tick().unwrap();
    assert_eq!(app.editor(0).unwrap().model(), "container-bd-d40-a1346");

    assert!(app.commit_threshold(0, Quantity::OilTemperature, LevelKey::CriticalHigh, 60.0));
    app.save_thresholds(0);
    app.tick().unwrap();

    let oil = app.views[0].thresholds.get(Quantity::OilTemperature).unwrap();
    assert_eq!(oil.get(LevelKey::CriticalHigh), Some(60.0));
    assert_eq!(app.saved_settings().len(), 1);
    assert!(app
        .notifications
        .iter()
        .any(|n| n.message == "Thresholds saved for container-bd-d40-a1346"));
}

#[test]
fn notifications_after_keeps_counting_past_history_cap() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), false);
    cfg.history_size = 2;
    let mut app = App::new(cfg).unwrap();

    let mut printed = Vec::new();
    let mut reported = 0;
    for i in 0..5 {
        app.notify(NotificationLevel::Error, format!("failure {i}"));
        printed.extend(app.notifications_after(reported).map(|n| n.message.clone()));
        reported = app.notified_total();
    }

    assert_eq!(app.notifications.len(), 2);
    assert_eq!(app.notified_total(), 5);
    assert_eq!(
        printed,
        vec!["failure 0", "failure 1", "failure 2", "failure 3", "failure 4"]
    );
}

#[test]
fn sound_consent_flag_grants_up_front() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), false);
    assert_eq!(App::new(cfg.clone()).unwrap().consent, SoundConsent::Pending);

    cfg.sound_consent = true;
    assert_eq!(App::new(cfg).unwrap().consent, SoundConsent::Granted);
}
