//! Autopilot mode, target, and maneuver plan persisted per vessel.

use std::fmt;
use std::str::FromStr;

use pt_core::ids::VesselId;
use pt_core::vector::Vector3;

use crate::{ModuleStateStore, StateError, fields};

/// Attitude hold modes that determine the background thrust heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutopilotMode {
    /// Hold the current facing.
    StabilityAssist,
    Prograde,
    Retrograde,
    Normal,
    AntiNormal,
    RadialIn,
    RadialOut,
    Target,
    AntiTarget,
    Maneuver,
}

impl AutopilotMode {
    pub const ALL: [AutopilotMode; 10] = [
        AutopilotMode::StabilityAssist,
        AutopilotMode::Prograde,
        AutopilotMode::Retrograde,
        AutopilotMode::Normal,
        AutopilotMode::AntiNormal,
        AutopilotMode::RadialIn,
        AutopilotMode::RadialOut,
        AutopilotMode::Target,
        AutopilotMode::AntiTarget,
        AutopilotMode::Maneuver,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AutopilotMode::StabilityAssist => "stability_assist",
            AutopilotMode::Prograde => "prograde",
            AutopilotMode::Retrograde => "retrograde",
            AutopilotMode::Normal => "normal",
            AutopilotMode::AntiNormal => "anti_normal",
            AutopilotMode::RadialIn => "radial_in",
            AutopilotMode::RadialOut => "radial_out",
            AutopilotMode::Target => "target",
            AutopilotMode::AntiTarget => "anti_target",
            AutopilotMode::Maneuver => "maneuver",
        }
    }
}

impl fmt::Display for AutopilotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutopilotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();
        let mode = match key.as_str() {
            "stabilityassist" | "hold" | "stability" => AutopilotMode::StabilityAssist,
            "prograde" => AutopilotMode::Prograde,
            "retrograde" => AutopilotMode::Retrograde,
            "normal" => AutopilotMode::Normal,
            "antinormal" => AutopilotMode::AntiNormal,
            "radialin" => AutopilotMode::RadialIn,
            "radialout" => AutopilotMode::RadialOut,
            "target" => AutopilotMode::Target,
            "antitarget" => AutopilotMode::AntiTarget,
            "maneuver" | "manoeuvre" => AutopilotMode::Maneuver,
            _ => return Err(format!("unknown autopilot mode `{s}`")),
        };
        Ok(mode)
    }
}

/// Stored navigation target: another vessel or a celestial body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Vessel(VesselId),
    Body(String),
}

impl FromStr for TargetRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("target `{s}` must be `vessel:<id>` or `body:<name>`"))?;
        match kind.trim() {
            "vessel" => value
                .trim()
                .parse::<u64>()
                .map(|id| TargetRef::Vessel(VesselId(id)))
                .map_err(|_| format!("target vessel id `{value}` is not an integer")),
            "body" if !value.trim().is_empty() => Ok(TargetRef::Body(value.trim().to_string())),
            "body" => Err("target body name is empty".to_string()),
            other => Err(format!("unknown target kind `{other}`")),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Vessel(id) => write!(f, "vessel:{}", id.0),
            TargetRef::Body(name) => write!(f, "body:{name}"),
        }
    }
}

/// Planned orbital patch transition.
///
/// The patch is stored as the state vectors (orbit frame) the vessel should
/// have right after the node at `node_ut`. The burn vector is the difference
/// between the patch velocity and the current orbit's velocity at that time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManeuverPlan {
    pub node_ut: f64,
    pub patch_position: Vector3,
    pub patch_velocity: Vector3,
}

impl FromStr for ManeuverPlan {
    type Err = String;

    /// `<ut>|<px>,<py>,<pz>|<vx>,<vy>,<vz>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sections = s.trim().split('|');
        let (Some(ut), Some(pos), Some(vel), None) = (
            sections.next(),
            sections.next(),
            sections.next(),
            sections.next(),
        ) else {
            return Err(format!("maneuver `{s}` must have three `|`-separated sections"));
        };
        let node_ut: f64 = ut
            .trim()
            .parse()
            .map_err(|_| format!("maneuver time `{ut}` is not a number"))?;
        if !node_ut.is_finite() {
            return Err("maneuver time must be finite".to_string());
        }
        Ok(Self {
            node_ut,
            patch_position: parse_vector(pos)?,
            patch_velocity: parse_vector(vel)?,
        })
    }
}

impl fmt::Display for ManeuverPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [px, py, pz] = self.patch_position;
        let [vx, vy, vz] = self.patch_velocity;
        write!(f, "{}|{px},{py},{pz}|{vx},{vy},{vz}", self.node_ut)
    }
}

fn parse_vector(raw: &str) -> Result<Vector3, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("vector `{raw}` must have three components"));
    }
    let mut out = [0.0; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        let value: f64 = part
            .parse()
            .map_err(|_| format!("vector component `{part}` is not a number"))?;
        if !value.is_finite() {
            return Err(format!("vector component `{part}` is not finite"));
        }
        *slot = value;
    }
    Ok(out)
}

/// Per-vessel autopilot fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AutopilotState {
    pub mode: AutopilotMode,
    pub target: Option<TargetRef>,
    pub maneuver: Option<ManeuverPlan>,
}

impl Default for AutopilotState {
    fn default() -> Self {
        Self {
            mode: AutopilotMode::StabilityAssist,
            target: None,
            maneuver: None,
        }
    }
}

impl AutopilotState {
    /// A missing mode means the autopilot holds the current heading.
    pub fn from_store(store: &ModuleStateStore) -> Result<Self, StateError> {
        store.check_version()?;
        Ok(Self {
            mode: store
                .optional(fields::AUTOPILOT_MODE)?
                .unwrap_or(AutopilotMode::StabilityAssist),
            target: store.optional(fields::TARGET)?,
            maneuver: store.optional(fields::MANEUVER)?,
        })
    }

    pub fn write_to(&self, store: &mut ModuleStateStore) {
        store.stamp_version();
        store.set(fields::AUTOPILOT_MODE, self.mode.as_str());
        match &self.target {
            Some(target) => store.set(fields::TARGET, target.to_string()),
            None => {
                store.remove(fields::TARGET);
            }
        }
        match &self.maneuver {
            Some(plan) => store.set(fields::MANEUVER, plan.to_string()),
            None => {
                store.remove(fields::MANEUVER);
            }
        }
    }
}
