//! Site snapshot reader for coolwatch.
//!
//! The fleet transport is out of scope: whatever polls the containers drops
//! a JSON snapshot on disk and the dashboard re-reads it every tick.
//!
//! ```json
//! {
//!   "site": "site-a",
//!   "containers": [
//!     {"name": "bd-01", "type": "container-bd-d40-a1346", "status": "running",
//!      "last": {"tank1_bar": 2.1}, "thresholds": null}
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::alarm::Container;
use crate::error::Result;

/// Site descriptor plus the latest state of its containers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SiteSnapshot {
    #[serde(default)]
    pub site: String,
    /// Malformed entries are skipped, the rest still load
    #[serde(default, deserialize_with = "lenient_containers")]
    pub containers: Vec<Container>,
}

fn lenient_containers<'de, D>(deserializer: D) -> std::result::Result<Vec<Container>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(container) => Some(container),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed container");
                None
            }
        })
        .collect())
}

impl SiteSnapshot {
    /// A snapshot without a site name does not count as a loaded site.
    pub fn site_loaded(&self) -> bool {
        !self.site.trim().is_empty()
    }
}

/// Read and parse a snapshot file.
pub fn read_snapshot(path: &Path) -> Result<SiteSnapshot> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
