//! Isobaric labeling reagents and their reporter ion channels
use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::QuantError;

/// A reporter ion to quantify
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReporterChannel {
    pub label: String,
    /// Monoisotopic m/z of the reporter ion
    pub mass: f64,
}

impl ReporterChannel {
    pub fn new(label: impl Into<String>, mass: f64) -> Self {
        Self {
            label: label.into(),
            mass,
        }
    }
}

const TMT126: (&str, f64) = ("tmt126", 126.127726);
const TMT127N: (&str, f64) = ("tmt127N", 127.124761);
const TMT127C: (&str, f64) = ("tmt127C", 127.131081);
const TMT128N: (&str, f64) = ("tmt128N", 128.128116);
const TMT128C: (&str, f64) = ("tmt128C", 128.134436);
const TMT129N: (&str, f64) = ("tmt129N", 129.131471);
const TMT129C: (&str, f64) = ("tmt129C", 129.137790);
const TMT130N: (&str, f64) = ("tmt130N", 130.134825);
const TMT130C: (&str, f64) = ("tmt130C", 130.141145);
const TMT131: (&str, f64) = ("tmt131", 131.138180);
const TMT131N: (&str, f64) = ("tmt131N", 131.138180);
const TMT131C: (&str, f64) = ("tmt131C", 131.144499);

const ITRAQ113: (&str, f64) = ("iTRAQ113", 113.107873);
const ITRAQ114: (&str, f64) = ("iTRAQ114", 114.111228);
const ITRAQ115: (&str, f64) = ("iTRAQ115", 115.108263);
const ITRAQ116: (&str, f64) = ("iTRAQ116", 116.111618);
const ITRAQ117: (&str, f64) = ("iTRAQ117", 117.114973);
const ITRAQ118: (&str, f64) = ("iTRAQ118", 118.112008);
const ITRAQ119: (&str, f64) = ("iTRAQ119", 119.115363);
const ITRAQ121: (&str, f64) = ("iTRAQ121", 121.122072);

/// The full TMT nominal mass ladder, each step one N/C isomer apart
pub const TMT_LADDER: [&str; 11] = [
    "tmt126", "tmt127N", "tmt127C", "tmt128N", "tmt128C", "tmt129N", "tmt129C", "tmt130N",
    "tmt130C", "tmt131N", "tmt131C",
];

/// The position of a TMT channel label on [`TMT_LADDER`]. The 10-plex
/// `tmt131` sits on the `tmt131N` rung.
pub fn tmt_ladder_position(label: &str) -> Option<usize> {
    let label = if label == "tmt131" { "tmt131N" } else { label };
    TMT_LADDER.iter().position(|l| *l == label)
}

/// How impurity offsets translate into channel positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReagentFamily {
    /// Offsets are positions on the 11-plex isomer ladder, two per nominal mass
    Tmt,
    /// Offsets are direct shifts in channel index
    Itraq,
    /// User supplied channels, treated like [`ReagentFamily::Itraq`]
    Custom,
}

/// A reagent to quantify
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReagentKind {
    #[cfg_attr(feature = "serde", serde(rename = "TMT0"))]
    Tmt0,
    #[cfg_attr(feature = "serde", serde(rename = "TMT2"))]
    Tmt2,
    #[cfg_attr(feature = "serde", serde(rename = "TMT6"))]
    Tmt6,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "TMT10"))]
    Tmt10,
    #[cfg_attr(feature = "serde", serde(rename = "TMT11"))]
    Tmt11,
    #[cfg_attr(feature = "serde", serde(rename = "iTRAQ4"))]
    Itraq4,
    #[cfg_attr(feature = "serde", serde(rename = "iTRAQ8"))]
    Itraq8,
    /// Channels read from a user supplied table
    #[cfg_attr(feature = "serde", serde(rename = "custom"))]
    Custom,
}

impl ReagentKind {
    pub fn family(&self) -> ReagentFamily {
        match self {
            Self::Tmt0 | Self::Tmt2 | Self::Tmt6 | Self::Tmt10 | Self::Tmt11 => ReagentFamily::Tmt,
            Self::Itraq4 | Self::Itraq8 => ReagentFamily::Itraq,
            Self::Custom => ReagentFamily::Custom,
        }
    }

    /// The built-in channel table, `None` for [`ReagentKind::Custom`]
    pub fn builtin_channels(&self) -> Option<Vec<ReporterChannel>> {
        let table: &[(&str, f64)] = match self {
            Self::Tmt0 => &[TMT126],
            Self::Tmt2 => &[TMT126, TMT127C],
            Self::Tmt6 => &[TMT126, TMT127N, TMT128C, TMT129N, TMT130C, TMT131],
            Self::Tmt10 => &[
                TMT126, TMT127N, TMT127C, TMT128N, TMT128C, TMT129N, TMT129C, TMT130N, TMT130C,
                TMT131,
            ],
            Self::Tmt11 => &[
                TMT126, TMT127N, TMT127C, TMT128N, TMT128C, TMT129N, TMT129C, TMT130N, TMT130C,
                TMT131N, TMT131C,
            ],
            Self::Itraq4 => &[ITRAQ114, ITRAQ115, ITRAQ116, ITRAQ117],
            Self::Itraq8 => &[
                ITRAQ113, ITRAQ114, ITRAQ115, ITRAQ116, ITRAQ117, ITRAQ118, ITRAQ119, ITRAQ121,
            ],
            Self::Custom => return None,
        };
        Some(
            table
                .iter()
                .map(|(label, mass)| ReporterChannel::new(*label, *mass))
                .collect(),
        )
    }
}

impl FromStr for ReagentKind {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tmt0" => Ok(Self::Tmt0),
            "tmt2" => Ok(Self::Tmt2),
            "tmt6" => Ok(Self::Tmt6),
            "tmt10" => Ok(Self::Tmt10),
            "tmt11" => Ok(Self::Tmt11),
            "itraq4" => Ok(Self::Itraq4),
            "itraq8" => Ok(Self::Itraq8),
            "custom" => Ok(Self::Custom),
            _ => Err(QuantError::UnknownReagent(s.to_string())),
        }
    }
}

impl Display for ReagentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tmt0 => "TMT0",
            Self::Tmt2 => "TMT2",
            Self::Tmt6 => "TMT6",
            Self::Tmt10 => "TMT10",
            Self::Tmt11 => "TMT11",
            Self::Itraq4 => "iTRAQ4",
            Self::Itraq8 => "iTRAQ8",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// The ordered reporter channels of one quantification run.
///
/// The order and spelling of the labels are the contract every impurity table
/// must match.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterSet {
    kind: ReagentKind,
    channels: Vec<ReporterChannel>,
}

impl ReporterSet {
    pub fn builtin(kind: ReagentKind) -> Option<Self> {
        kind.builtin_channels()
            .map(|channels| Self { kind, channels })
    }

    /// A user defined channel set. Labels must be unique and masses positive.
    pub fn custom(channels: Vec<ReporterChannel>) -> Result<Self, QuantError> {
        if channels.is_empty() {
            return Err(QuantError::EmptyChannelSet);
        }
        let mut seen = HashSet::new();
        for channel in channels.iter() {
            if !seen.insert(channel.label.as_str()) {
                return Err(QuantError::InvalidReporterSet(format!(
                    "duplicate label {:?}",
                    channel.label
                )));
            }
            if !(channel.mass.is_finite() && channel.mass > 0.0) {
                return Err(QuantError::InvalidReporterSet(format!(
                    "{:?} has an invalid mass {}",
                    channel.label, channel.mass
                )));
            }
        }
        Ok(Self {
            kind: ReagentKind::Custom,
            channels,
        })
    }

    pub fn kind(&self) -> ReagentKind {
        self.kind
    }

    pub fn family(&self) -> ReagentFamily {
        self.kind.family()
    }

    /// Whether impurity offsets move along the TMT isomer ladder for this set.
    ///
    /// A custom set uses the ladder when every one of its labels names a TMT
    /// channel.
    pub fn uses_tmt_ladder(&self) -> bool {
        match self.family() {
            ReagentFamily::Tmt => true,
            ReagentFamily::Itraq => false,
            ReagentFamily::Custom => self
                .channels
                .iter()
                .all(|c| tmt_ladder_position(&c.label).is_some()),
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[ReporterChannel] {
        &self.channels
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReporterChannel> {
        self.channels.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.label.as_str()).collect()
    }
}
