//! # coolwatch
//!
//! Threshold classification and alarm dashboard for the cooling systems of
//! mining containers.
//!
//! ## Overview
//!
//! Each container family (Bitdeer, MicroBT, Antspace hydro and immersion)
//! reports cooling telemetry with its own field layout. `coolwatch` maps
//! those readings onto five-level threshold bands and answers, per poll:
//!
//! - Which severity each channel is at, and which color it shows
//! - Whether the container should flash
//! - Whether an audible alarm should sound (critically high only)
//!
//! Thresholds come from saved settings, the container's own payload or the
//! built-in tables, in that order. Operators edit them live; committing a
//! level cascades its neighbours so the band stays ordered.
//!
//! ## Module Organization
//!
//! - [`thresholds`]: Bands, severities and the classification rule
//! - [`registry`]: Container types, built-in tables and threshold resolution
//! - [`telemetry`]: Raw payload layouts per container family
//! - [`classifier`]: Per-family classification strategies
//! - [`alarm`]: Container-level aggregation and the sound policy
//! - [`editor`]: Cascading threshold editor with save and reset
//! - [`autosave`]: One-time persistence of built-in thresholds
//! - [`settings`]: Settings records and stores
//! - [`snapshot`]: Site snapshot reader
//! - [`config`]: CLI argument parsing and configuration
//! - [`app`]: Main application state and coordination
//! - [`ui`]: Terminal user interface

pub mod alarm;
pub mod app;
pub mod autosave;
pub mod classifier;
pub mod config;
pub mod editor;
pub mod error;
pub mod registry;
pub mod settings;
pub mod snapshot;
pub mod telemetry;
pub mod thresholds;
pub mod ui;

pub use error::{Error, Result};
