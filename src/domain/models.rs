use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six faces of the cube.
///
/// The declaration order matches the face nibble on the wire (1-based),
/// so `Face::B` is nibble 1 and `Face::F` is nibble 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    B,
    D,
    L,
    U,
    R,
    F,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::B, Face::D, Face::L, Face::U, Face::R, Face::F];

    /// Face for a 1-based face nibble, `None` outside 1..=6
    pub fn from_nibble(nibble: u8) -> Option<Face> {
        match nibble {
            1..=6 => Some(Self::ALL[(nibble - 1) as usize]),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::B => 'B',
            Self::D => 'D',
            Self::L => 'L',
            Self::U => 'U',
            Self::R => 'R',
            Self::F => 'F',
        }
    }

    /// Sticker color of this face's center on a solved cube
    pub fn color(self) -> Color {
        match self {
            Self::B => Color::Blue,
            Self::D => Color::Yellow,
            Self::L => Color::Orange,
            Self::U => Color::White,
            Self::R => Color::Red,
            Self::F => Color::Green,
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Sticker color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Yellow,
    Orange,
    White,
    Red,
    Green,
}

impl Color {
    pub fn name(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::White => "white",
            Self::Red => "red",
            Self::Green => "green",
        }
    }

    /// Face whose center carries this color
    pub fn face(self) -> Face {
        match self {
            Self::Blue => Face::B,
            Self::Yellow => Face::D,
            Self::Orange => Face::L,
            Self::White => Face::U,
            Self::Red => Face::R,
            Self::Green => Face::F,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rotation applied to a face by a single move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turn {
    /// +1
    Clockwise,
    /// +2
    Double,
    /// -1
    CounterClockwise,
    /// -2
    DoubleCounterClockwise,
}

impl Turn {
    /// Turn for a turn nibble. Only 1, 2, 3 and 9 are emitted by the cube.
    pub fn from_nibble(nibble: u8) -> Option<Turn> {
        match nibble.checked_sub(1)? {
            0 => Some(Self::Clockwise),
            1 => Some(Self::Double),
            2 => Some(Self::CounterClockwise),
            8 => Some(Self::DoubleCounterClockwise),
            _ => None,
        }
    }

    /// Signed quarter-turn amount: +1, +2, -1 or -2
    pub fn amount(self) -> i8 {
        match self {
            Self::Clockwise => 1,
            Self::Double => 2,
            Self::CounterClockwise => -1,
            Self::DoubleCounterClockwise => -2,
        }
    }
}

/// A single decoded face turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub face: Face,
    pub turn: Turn,
    /// Algebraic notation, e.g. `R`, `U2`, `F'`, `B2'`
    pub notation: String,
}

impl Move {
    pub fn amount(&self) -> i8 {
        self.turn.amount()
    }
}

/// Decoded but unprojected cube snapshot.
///
/// Positions are 1-based piece ids; corner orientations are the raw
/// rotation class (1, 2 or 3). Instances only come out of
/// [`RawState::try_new`] or [`RawState::solved`], so the permutation and
/// range invariants always hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawState {
    corner_positions: [u8; 8],
    corner_orientations: [u8; 8],
    edge_positions: [u8; 12],
    edge_orientations: [bool; 12],
}

/// Which invariant of a [`RawState`] was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    CornerPositions,
    CornerOrientations,
    EdgePositions,
}

impl RawState {
    /// Validate and build a snapshot
    pub fn try_new(
        corner_positions: [u8; 8],
        corner_orientations: [u8; 8],
        edge_positions: [u8; 12],
        edge_orientations: [bool; 12],
    ) -> Result<Self, StateViolation> {
        if !is_permutation(&corner_positions) {
            return Err(StateViolation::CornerPositions);
        }
        if corner_orientations.iter().any(|o| !(1..=3).contains(o)) {
            return Err(StateViolation::CornerOrientations);
        }
        if !is_permutation(&edge_positions) {
            return Err(StateViolation::EdgePositions);
        }

        Ok(Self {
            corner_positions,
            corner_orientations,
            edge_positions,
            edge_orientations,
        })
    }

    /// Snapshot reported by a solved cube
    pub fn solved() -> Self {
        Self {
            corner_positions: [1, 2, 3, 4, 5, 6, 7, 8],
            corner_orientations: [3; 8],
            edge_positions: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            edge_orientations: [false; 12],
        }
    }

    pub fn corner_positions(&self) -> &[u8; 8] {
        &self.corner_positions
    }

    pub fn corner_orientations(&self) -> &[u8; 8] {
        &self.corner_orientations
    }

    pub fn edge_positions(&self) -> &[u8; 12] {
        &self.edge_positions
    }

    pub fn edge_orientations(&self) -> &[bool; 12] {
        &self.edge_orientations
    }
}

/// True when `values` holds each of 1..=len exactly once
fn is_permutation(values: &[u8]) -> bool {
    let mut seen = vec![false; values.len()];
    for &v in values {
        let idx = v as usize;
        if idx == 0 || idx > values.len() || seen[idx - 1] {
            return false;
        }
        seen[idx - 1] = true;
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingState {
    Charged,
    Charging,
    NotCharging,
}

impl ChargingState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Charged),
            2 => Some(Self::Charging),
            3 => Some(Self::NotCharging),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Charged => 1,
            Self::Charging => 2,
            Self::NotCharging => 3,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Charged => "Charged",
            Self::Charging => "Charging",
            Self::NotCharging => "Not Charging",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryReading {
    /// Percentage, 0-100
    pub level: u8,
    pub charging_state: ChargingState,
}

/// Names under which events are published on the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Move,
    Battery,
    MoveCount,
    UpdateState,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Move => "move",
            Self::Battery => "battery",
            Self::MoveCount => "move count",
            Self::UpdateState => "update state",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            "move" => Ok(Self::Move),
            "battery" => Ok(Self::Battery),
            "move count" => Ok(Self::MoveCount),
            "update state" => Ok(Self::UpdateState),
            other => Err(format!("unknown event name: {other}")),
        }
    }
}

/// Events published by a device session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CubeEvent {
    Connected,
    Disconnected,
    Move(Move),
    Battery(BatteryReading),
    MoveCount(u32),
    /// The state changed without a move to report; re-read derived views
    UpdateState,
}

impl CubeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::Move(_) => EventKind::Move,
            Self::Battery(_) => EventKind::Battery,
            Self::MoveCount(_) => EventKind::MoveCount,
            Self::UpdateState => EventKind::UpdateState,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Discovering,
    Connected,
    Disconnecting,
}
