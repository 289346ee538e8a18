//! Giiker Cube Protocol
//!
//! This module contains the protocol definitions for communicating with
//! the Giiker smart cube: GATT identifiers, request command bytes, and the
//! decoders for state and info frames.

use crate::domain::models::{
    BatteryReading, ChargingState, Face, Move, RawState, StateViolation, Turn,
};
use crate::domain::notation;
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

/// Service carrying the cube state characteristic
pub const CUBE_STATE_SERVICE: Uuid = Uuid::from_u128(0x0000aadb_0000_1000_8000_00805f9b34fb);

/// Service carrying the info request / response characteristics
pub const CUBE_INFO_SERVICE: Uuid = Uuid::from_u128(0x0000aaaa_0000_1000_8000_00805f9b34fb);

/// State characteristic (read + notify)
pub const CUBE_STATE_RESPONSE: Uuid = Uuid::from_u128(0x0000aadc_0000_1000_8000_00805f9b34fb);

/// Info response characteristic (notify), shared by battery and move count
pub const CUBE_INFO_RESPONSE: Uuid = Uuid::from_u128(0x0000aaab_0000_1000_8000_00805f9b34fb);

/// Info request characteristic (write without response)
pub const CUBE_INFO_REQUEST: Uuid = Uuid::from_u128(0x0000aaac_0000_1000_8000_00805f9b34fb);

/// Single-byte commands written to the info request characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeCommand {
    /// Ask for the lifetime move counter
    MoveCount,
    /// Tell the cube its current physical state is solved
    ResetSolved,
    /// Reset to a custom state (never sent by the session)
    ResetCustom,
    /// Ask for battery level and charging state
    Battery,
}

impl CubeCommand {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::MoveCount => 0xCC,
            Self::ResetSolved => 0xA1,
            Self::ResetCustom => 0xA4,
            Self::Battery => 0xB5,
        }
    }

    pub fn as_bytes(self) -> [u8; 1] {
        [self.as_byte()]
    }
}

/// Fixed part of a state frame; any further bytes are moves
pub const STATE_FRAME_LEN: usize = 16;

/// Errors produced while decoding frames from the cube
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("invalid cube state: {0}")]
    InvalidState(&'static str),

    #[error("invalid face nibble: {0}")]
    InvalidFace(u8),

    #[error("invalid turn nibble: {0}")]
    InvalidTurn(u8),

    #[error("empty info frame")]
    EmptyInfoFrame,

    #[error("unknown info frame tag: {0:#04x}")]
    UnknownInfoTag(u8),

    #[error("unknown charging state code: {0}")]
    UnknownChargingState(u8),
}

impl From<StateViolation> for DecodeError {
    fn from(violation: StateViolation) -> Self {
        Self::InvalidState(match violation {
            StateViolation::CornerPositions => "corner positions are not a permutation of 1..=8",
            StateViolation::CornerOrientations => "corner orientation outside 1..=3",
            StateViolation::EdgePositions => "edge positions are not a permutation of 1..=12",
        })
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Result of decoding one state frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFrame {
    pub state: RawState,
    /// Moves carried after the fixed part, most recent first
    pub moves: Vec<Move>,
}

/// Decode a state frame
///
/// # Frame Structure
///
/// ```text
/// [0-3]   : Corner positions, one nibble each (high, low)
/// [4-7]   : Corner orientations, one nibble each
/// [8-13]  : Edge positions, one nibble each
/// [14]    : Edge orientations 0-7, bit 7 first
/// [15]    : Edge orientations 8-11, bits 7-4
/// [16..]  : One move per byte: high nibble face, low nibble turn
/// ```
pub fn decode_state(bytes: &[u8]) -> Result<StateFrame> {
    if bytes.len() < STATE_FRAME_LEN {
        return Err(DecodeError::FrameTooShort {
            expected: STATE_FRAME_LEN,
            actual: bytes.len(),
        });
    }

    trace!("State frame: {:02X?}", bytes);

    let mut corner_positions = [0u8; 8];
    unpack_nibbles(&bytes[0..4], &mut corner_positions);

    let mut corner_orientations = [0u8; 8];
    unpack_nibbles(&bytes[4..8], &mut corner_orientations);

    let mut edge_positions = [0u8; 12];
    unpack_nibbles(&bytes[8..14], &mut edge_positions);

    let mut edge_orientations = [false; 12];
    for (i, flipped) in edge_orientations.iter_mut().enumerate() {
        let byte = bytes[14 + i / 8];
        *flipped = byte & (0x80 >> (i % 8)) != 0;
    }

    let state = RawState::try_new(
        corner_positions,
        corner_orientations,
        edge_positions,
        edge_orientations,
    )?;

    let moves = bytes[STATE_FRAME_LEN..]
        .iter()
        .map(|&byte| decode_move(byte >> 4, byte & 0x0F))
        .collect::<Result<Vec<_>>>()?;

    Ok(StateFrame { state, moves })
}

/// Split each byte into its high and low nibble
fn unpack_nibbles(bytes: &[u8], out: &mut [u8]) {
    for (pair, byte) in out.chunks_exact_mut(2).zip(bytes) {
        pair[0] = byte >> 4;
        pair[1] = byte & 0x0F;
    }
}

/// Decode one move from its face and turn nibbles
pub fn decode_move(face_nibble: u8, turn_nibble: u8) -> Result<Move> {
    let face = Face::from_nibble(face_nibble).ok_or(DecodeError::InvalidFace(face_nibble))?;
    let turn = Turn::from_nibble(turn_nibble).ok_or(DecodeError::InvalidTurn(turn_nibble))?;

    Ok(Move {
        face,
        turn,
        notation: notation::move_notation(face, turn),
    })
}

/// Decoded frame from the info response characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoResponse {
    Battery(BatteryReading),
    MoveCount(u32),
}

impl InfoResponse {
    /// Command whose tag this response carries
    pub fn command(&self) -> CubeCommand {
        match self {
            Self::Battery(_) => CubeCommand::Battery,
            Self::MoveCount(_) => CubeCommand::MoveCount,
        }
    }
}

/// Tag byte of an info frame, if any
pub fn info_tag(bytes: &[u8]) -> Option<u8> {
    bytes.first().copied()
}

/// Decode an info response frame
///
/// ```text
/// Battery:    [0xB5] [level 0-100] [charging state 1-3]
/// Move count: [0xCC] [count u32 big-endian]
/// ```
pub fn parse_info_frame(bytes: &[u8]) -> Result<InfoResponse> {
    let tag = info_tag(bytes).ok_or(DecodeError::EmptyInfoFrame)?;

    if tag == CubeCommand::Battery.as_byte() {
        let [_, level, code, ..] = *bytes else {
            return Err(DecodeError::FrameTooShort {
                expected: 3,
                actual: bytes.len(),
            });
        };
        let charging_state =
            ChargingState::from_code(code).ok_or(DecodeError::UnknownChargingState(code))?;
        Ok(InfoResponse::Battery(BatteryReading {
            level,
            charging_state,
        }))
    } else if tag == CubeCommand::MoveCount.as_byte() {
        let [_, b1, b2, b3, b4, ..] = *bytes else {
            return Err(DecodeError::FrameTooShort {
                expected: 5,
                actual: bytes.len(),
            });
        };
        Ok(InfoResponse::MoveCount(u32::from_be_bytes([b1, b2, b3, b4])))
    } else {
        Err(DecodeError::UnknownInfoTag(tag))
    }
}
