//! Lifecycle scenarios for DST.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// DST-001: Fixed frame rate, every frame checked
    SteadyState,

    /// DST-002: Long stalls between refreshes, no catch-up
    FrameStall,

    /// DST-003: Repeated mount/unmount with a host that keeps calling
    RemountChurn,

    /// DST-004: Recorded frames reproduced by re-evaluation
    Rewind,

    /// DST-005: Health pulse and wall clock under a long run
    PulseSoak,

    /// DST-006: Every telemetry preset regenerated on a timer
    TelemetrySweep,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SteadyState,
            ScenarioId::FrameStall,
            ScenarioId::RemountChurn,
            ScenarioId::Rewind,
            ScenarioId::PulseSoak,
            ScenarioId::TelemetrySweep,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SteadyState => "steady_state",
            ScenarioId::FrameStall => "frame_stall",
            ScenarioId::RemountChurn => "remount_churn",
            ScenarioId::Rewind => "rewind",
            ScenarioId::PulseSoak => "pulse_soak",
            ScenarioId::TelemetrySweep => "telemetry_sweep",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SteadyState => "Scene at a fixed frame rate, invariants checked on every frame",
            ScenarioId::FrameStall => "Random refresh stalls up to 2s, t stays strictly increasing",
            ScenarioId::RemountChurn => "Mount/unmount cycles on a host that ignores deregistration",
            ScenarioId::Rewind => "Recorded frames re-evaluated after the scene moved on",
            ScenarioId::PulseSoak => "Health pulse, wall clock and scene sharing one host",
            ScenarioId::TelemetrySweep => "All series presets regenerated on a timer and summarized",
        }
    }

    /// Returns true if the scenario drives a scene (as opposed to series only).
    pub fn uses_scene(&self) -> bool {
        !matches!(self, ScenarioId::TelemetrySweep)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "steady_state" | "steadystate" | "dst_001" => Ok(ScenarioId::SteadyState),
            "frame_stall" | "framestall" | "dst_002" => Ok(ScenarioId::FrameStall),
            "remount_churn" | "remountchurn" | "dst_003" => Ok(ScenarioId::RemountChurn),
            "rewind" | "dst_004" => Ok(ScenarioId::Rewind),
            "pulse_soak" | "pulsesoak" | "dst_005" => Ok(ScenarioId::PulseSoak),
            "telemetry_sweep" | "telemetrysweep" | "dst_006" => Ok(ScenarioId::TelemetrySweep),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("DST-004".parse::<ScenarioId>(), Ok(ScenarioId::Rewind));
        assert_eq!("frame-stall".parse::<ScenarioId>(), Ok(ScenarioId::FrameStall));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
