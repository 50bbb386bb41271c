//! Typed inbound reading messages.
//!
//! Fields are optional at the serde level so that a missing key surfaces as
//! [`PipelineError::MissingField`] naming the exact key, instead of a generic
//! deserialization failure.

use crate::core::error::PipelineError;
use serde::{Deserialize, Serialize};

/// The two monitored machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineId {
    Machine1,
    Machine2,
}

impl MachineId {
    pub const ALL: [MachineId; 2] = [MachineId::Machine1, MachineId::Machine2];

    pub fn name(self) -> &'static str {
        match self {
            MachineId::Machine1 => "machine1",
            MachineId::Machine2 => "machine2",
        }
    }

    /// Message key of the left vibration channel.
    pub fn left_key(self) -> &'static str {
        match self {
            MachineId::Machine1 => "machine1_left",
            MachineId::Machine2 => "machine2_left",
        }
    }

    /// Message key of the right vibration channel.
    pub fn right_key(self) -> &'static str {
        match self {
            MachineId::Machine1 => "machine1_right",
            MachineId::Machine2 => "machine2_right",
        }
    }
}

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn require<'a>(field: &'a Option<Vec<f64>>, key: &str) -> Result<&'a [f64], PipelineError> {
    field
        .as_deref()
        .ok_or_else(|| PipelineError::MissingField(key.to_string()))
}

/// Vibration samples for both machines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VibrationMessage {
    #[serde(default)]
    pub machine1_left: Option<Vec<f64>>,
    #[serde(default)]
    pub machine1_right: Option<Vec<f64>>,
    #[serde(default)]
    pub machine2_left: Option<Vec<f64>>,
    #[serde(default)]
    pub machine2_right: Option<Vec<f64>>,
}

impl VibrationMessage {
    /// Build a complete message.
    pub fn new(
        machine1: (Vec<f64>, Vec<f64>),
        machine2: (Vec<f64>, Vec<f64>),
    ) -> Self {
        Self {
            machine1_left: Some(machine1.0),
            machine1_right: Some(machine1.1),
            machine2_left: Some(machine2.0),
            machine2_right: Some(machine2.1),
        }
    }

    /// The `(left, right)` pair for a machine.
    pub fn pair(&self, machine: MachineId) -> Result<(&[f64], &[f64]), PipelineError> {
        let (left, right) = match machine {
            MachineId::Machine1 => (&self.machine1_left, &self.machine1_right),
            MachineId::Machine2 => (&self.machine2_left, &self.machine2_right),
        };
        Ok((
            require(left, machine.left_key())?,
            require(right, machine.right_key())?,
        ))
    }

    /// Check that every key is present.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for machine in MachineId::ALL {
            self.pair(machine)?;
        }
        Ok(())
    }

    /// Total samples across all channels.
    pub fn sample_count(&self) -> usize {
        [
            &self.machine1_left,
            &self.machine1_right,
            &self.machine2_left,
            &self.machine2_right,
        ]
        .iter()
        .map(|field| field.as_ref().map_or(0, Vec::len))
        .sum()
    }
}

/// Temperature samples for both machines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureMessage {
    #[serde(default)]
    pub machine1: Option<Vec<f64>>,
    #[serde(default)]
    pub machine2: Option<Vec<f64>>,
}

impl TemperatureMessage {
    pub fn new(machine1: Vec<f64>, machine2: Vec<f64>) -> Self {
        Self {
            machine1: Some(machine1),
            machine2: Some(machine2),
        }
    }

    pub fn samples(&self, machine: MachineId) -> Result<&[f64], PipelineError> {
        let field = match machine {
            MachineId::Machine1 => &self.machine1,
            MachineId::Machine2 => &self.machine2,
        };
        require(field, machine.name())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for machine in MachineId::ALL {
            self.samples(machine)?;
        }
        Ok(())
    }
}

/// One line of a replay file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reading {
    Vibration(VibrationMessage),
    Temperature(TemperatureMessage),
}
