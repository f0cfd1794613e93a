//! Portal feature toggles

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ACCOMMODATION_OPEN: &str = "accommodation_open";
pub const CHECK_IN_OPEN: &str = "check_in_open";

/// Typed view over the settings key/value table. Absent keys read as closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSettings {
    /// Participants may submit accommodation requests
    pub accommodation_open: bool,
    /// Desk volunteers may check participants in
    pub check_in_open: bool,
}

impl PortalSettings {
    /// Build from stored key/value pairs; unknown keys are ignored
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = PortalSettings::default();
        for (key, value) in pairs {
            let flag = parse_flag(key.as_ref(), value.as_ref());
            match key.as_ref() {
                ACCOMMODATION_OPEN => settings.accommodation_open = flag,
                CHECK_IN_OPEN => settings.check_in_open = flag,
                _ => {}
            }
        }
        settings
    }

    /// Key/value pairs for persistence
    pub fn to_pairs(&self) -> [(&'static str, String); 2] {
        [
            (ACCOMMODATION_OPEN, self.accommodation_open.to_string()),
            (CHECK_IN_OPEN, self.check_in_open.to_string()),
        ]
    }

    pub fn apply(mut self, update: &UpdateSettings) -> Self {
        if let Some(open) = update.accommodation_open {
            self.accommodation_open = open;
        }
        if let Some(open) = update.check_in_open {
            self.check_in_open = open;
        }
        self
    }
}

fn parse_flag(key: &str, value: &str) -> bool {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" | "" => false,
        other => {
            warn!(key = %key, value = %other, "Unrecognised setting value, treating as off");
            false
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettings {
    pub accommodation_open: Option<bool>,
    pub check_in_open: Option<bool>,
}
