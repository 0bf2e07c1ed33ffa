//! I/O instance configuration.
//!
//! Typed per-instance configs (`DigitalOutputConfig`, `DigitalInputConfig`)
//! are the creation API surface. `BoardConfig` is the TOML "board file"
//! consumed by the demo binary: a map of named groups, each carrying an
//! `io` array of points with a `type` discriminator and optional
//! type-specific fields, converted into typed configs at load time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::digital::{DigitalState, IoType, PullResistance};

// ─── Typed configs ──────────────────────────────────────────────────

/// Immutable configuration of one digital output endpoint.
///
/// Never mutated by the registry or the instance after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalOutputConfig {
    /// Registry identifier, unique per context.
    pub id: String,

    /// Human-readable display name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// Device address (e.g. a BCM pin number).
    pub address: u32,

    /// State applied during `initialize`, if any.
    #[serde(default)]
    pub initial_state: Option<DigitalState>,

    /// State applied during `shutdown`, if any. `Unknown` means "leave
    /// the pin as-is".
    #[serde(default)]
    pub shutdown_state: Option<DigitalState>,

    /// State meaning "on" for `on()`/`off()`. Default: `High`.
    #[serde(default)]
    pub on_state: Option<DigitalState>,
}

impl DigitalOutputConfig {
    /// Minimal config with the given id and address.
    pub fn new(id: impl Into<String>, address: u32) -> Self {
        Self {
            id: id.into(),
            name: None,
            address,
            initial_state: None,
            shutdown_state: None,
            on_state: None,
        }
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the state applied during `initialize`.
    pub fn initial(mut self, state: DigitalState) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the state applied during `shutdown`.
    pub fn on_shutdown(mut self, state: DigitalState) -> Self {
        self.shutdown_state = Some(state);
        self
    }

    /// Set the state meaning "on".
    pub fn on_state(mut self, state: DigitalState) -> Self {
        self.on_state = Some(state);
        self
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Immutable configuration of one digital input endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalInputConfig {
    /// Registry identifier, unique per context.
    pub id: String,

    /// Human-readable display name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// Device address (e.g. a BCM pin number).
    pub address: u32,

    /// Internal pull resistor setting. Default: `Off`.
    #[serde(default)]
    pub pull: PullResistance,
}

impl DigitalInputConfig {
    /// Minimal config with the given id and address.
    pub fn new(id: impl Into<String>, address: u32) -> Self {
        Self {
            id: id.into(),
            name: None,
            address,
            pull: PullResistance::Off,
        }
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the pull resistor mode.
    pub fn pull(mut self, pull: PullResistance) -> Self {
        self.pull = pull;
        self
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// ─── Board file ─────────────────────────────────────────────────────

/// A single I/O point definition from a board file.
///
/// Type-specific fields use `Option` / `#[serde(default)]`; fields
/// irrelevant for a point's `type` are ignored at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointConfig {
    /// I/O category discriminator.
    #[serde(rename = "type")]
    pub io_type: IoType,

    /// Registry id. Derived from group key and address when omitted.
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Device address.
    pub address: u32,

    /// Initial state (outputs only).
    #[serde(default)]
    pub initial: Option<DigitalState>,

    /// Shutdown state (outputs only).
    #[serde(default)]
    pub shutdown: Option<DigitalState>,

    /// "On" state (outputs only).
    #[serde(default)]
    pub on: Option<DigitalState>,

    /// Pull resistor mode (inputs only).
    #[serde(default)]
    pub pull: Option<PullResistance>,
}

impl PointConfig {
    /// Effective registry id: explicit id, or `<group>-<address>`.
    pub fn effective_id(&self, group_key: &str) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}-{}", group_key.to_lowercase(), self.address),
        }
    }

    /// Convert into a typed output config. Input-only fields are ignored.
    pub fn to_output_config(&self, group_key: &str) -> DigitalOutputConfig {
        let id = self.effective_id(group_key);
        if self.pull.is_some() {
            warn!("point '{id}': 'pull' has no effect on an output");
        }
        DigitalOutputConfig {
            id,
            name: self.name.clone(),
            address: self.address,
            initial_state: self.initial,
            shutdown_state: self.shutdown,
            on_state: self.on,
        }
    }

    /// Convert into a typed input config. Output-only fields are ignored.
    pub fn to_input_config(&self, group_key: &str) -> DigitalInputConfig {
        let id = self.effective_id(group_key);
        if self.initial.is_some() || self.shutdown.is_some() || self.on.is_some() {
            warn!("point '{id}': output-only fields have no effect on an input");
        }
        DigitalInputConfig {
            id,
            name: self.name.clone(),
            address: self.address,
            pull: self.pull.unwrap_or_default(),
        }
    }
}

/// A named group of I/O points from a board file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoGroup {
    /// Group display name.
    #[serde(default)]
    pub name: Option<String>,

    /// I/O points in this group.
    pub io: Vec<PointConfig>,
}

/// Top-level board configuration.
///
/// The TOML file is a map of group keys to [`IoGroup`] tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Ordered groups keyed by their TOML table name.
    #[serde(flatten)]
    pub groups: BTreeMap<String, IoGroup>,
}

/// Board file validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BoardConfigError {
    /// The TOML text failed to parse.
    #[error("board file parse error: {0}")]
    Parse(String),

    /// Two points resolve to the same registry id.
    #[error("duplicate point id '{id}' in groups '{group_a}' and '{group_b}'")]
    DuplicateId {
        /// The colliding id.
        id: String,
        /// Group containing the first occurrence.
        group_a: String,
        /// Group containing the second occurrence.
        group_b: String,
    },
}

impl BoardConfig {
    /// Parse and validate a board file from TOML text.
    ///
    /// # Errors
    /// Returns the parse failure, or the first duplicate-id collision.
    pub fn from_toml(toml_str: &str) -> Result<Self, BoardConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| BoardConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BoardConfigError> {
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        for (group_key, point) in self.all_points() {
            let id = point.effective_id(group_key);
            if let Some(prev_group) = seen.get(&id) {
                return Err(BoardConfigError::DuplicateId {
                    id,
                    group_a: prev_group.clone(),
                    group_b: group_key.to_string(),
                });
            }
            seen.insert(id, group_key.to_string());
        }
        Ok(())
    }

    /// Iterate all points with their group key.
    pub fn all_points(&self) -> impl Iterator<Item = (&str, &PointConfig)> {
        self.groups
            .iter()
            .flat_map(|(key, group)| group.io.iter().map(move |point| (key.as_str(), point)))
    }
}
