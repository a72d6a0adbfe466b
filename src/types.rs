use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Kind of per-round file produced by the game server.
///
/// The ordering (`Bf2Demo < PrDemo < Summary`) is used wherever a stable
/// iteration order matters, e.g. when replaying existing files at startup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// Battle recording. Produced for every play session.
    Bf2Demo,
    /// Player tracker recording.
    PrDemo,
    /// JSON match summary.
    Summary,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 3] = [
        ArtifactType::Bf2Demo,
        ArtifactType::PrDemo,
        ArtifactType::Summary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactType::Bf2Demo => "bf2demo",
            ArtifactType::PrDemo => "prdemo",
            ArtifactType::Summary => "summary",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Exact names only, so two config keys can never name the same type.
        match s {
            "bf2demo" => Ok(ArtifactType::Bf2Demo),
            "prdemo" => Ok(ArtifactType::PrDemo),
            "summary" => Ok(ArtifactType::Summary),
            other => Err(format!(
                "unknown artifact type: {other} (expected \"bf2demo\", \"prdemo\" or \"summary\")"
            )),
        }
    }
}

/// Parse a duration string like `"100ms"`, `"30s"`, `"5m"` or `"4h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled(value, 60, num_part),
        "h" => scaled(value, 60 * 60, num_part),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn scaled(value: u64, secs_per_unit: u64, num_part: &str) -> Result<Duration, String> {
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{num_part}' is too large"))
}
