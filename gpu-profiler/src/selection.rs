//! GPU selection

use serde::{Deserialize, Serialize};
use sightline_shared::DeviceId;
use std::fmt;
use std::str::FromStr;

/// Which devices to monitor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GpuSelection {
    #[default]
    All,
    Ids(Vec<DeviceId>),
}

impl GpuSelection {
    pub fn includes(&self, id: DeviceId) -> bool {
        match self {
            GpuSelection::All => true,
            GpuSelection::Ids(ids) => ids.contains(&id),
        }
    }
}

impl FromStr for GpuSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(GpuSelection::All);
        }

        let mut ids = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let id: DeviceId = part
                .parse()
                .map_err(|_| format!("Invalid GPU id: {}", part))?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(format!("Invalid GPU selection: '{}'", s));
        }
        Ok(GpuSelection::Ids(ids))
    }
}

impl TryFrom<String> for GpuSelection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GpuSelection> for String {
    fn from(selection: GpuSelection) -> Self {
        selection.to_string()
    }
}

impl fmt::Display for GpuSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuSelection::All => f.write_str("all"),
            GpuSelection::Ids(ids) => {
                let joined: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}
