//! Color Projection
//!
//! Maps a piece's raw position and orientation onto the sticker colors
//! visible at each face of the slot it occupies.
//!
//! ## Slot geometry
//!
//! ```text
//! corner slot   faces        edge slot   faces
//!     0         D R F            0        F D
//!     1         R U F            1        F R
//!     2         U L F            2        F U
//!     3         L D F            3        F L
//!     4         R D B            4        D R
//!     5         U R B            5        U R
//!     6         L U B            6        U L
//!     7         D L B            7        D L
//!                                8        B D
//!                                9        B R
//!                               10        B U
//!                               11        B L
//! ```

use crate::domain::models::{Color, Face};

use Color::{Blue as BL, Green as G, Orange as O, Red as RD, White as W, Yellow as Y};

/// Faces meeting at each corner slot, in sticker order
pub const CORNER_SLOT_FACES: [[Face; 3]; 8] = [
    [Face::D, Face::R, Face::F],
    [Face::R, Face::U, Face::F],
    [Face::U, Face::L, Face::F],
    [Face::L, Face::D, Face::F],
    [Face::R, Face::D, Face::B],
    [Face::U, Face::R, Face::B],
    [Face::L, Face::U, Face::B],
    [Face::D, Face::L, Face::B],
];

/// Faces meeting at each edge slot, in sticker order
pub const EDGE_SLOT_FACES: [[Face; 2]; 12] = [
    [Face::F, Face::D],
    [Face::F, Face::R],
    [Face::F, Face::U],
    [Face::F, Face::L],
    [Face::D, Face::R],
    [Face::U, Face::R],
    [Face::U, Face::L],
    [Face::D, Face::L],
    [Face::B, Face::D],
    [Face::B, Face::R],
    [Face::B, Face::U],
    [Face::B, Face::L],
];

/// Home colors of each corner piece (indexed by piece id - 1)
pub const CORNER_PIECE_COLORS: [[Color; 3]; 8] = [
    [Y, RD, G],
    [RD, W, G],
    [W, O, G],
    [O, Y, G],
    [RD, Y, BL],
    [W, RD, BL],
    [O, W, BL],
    [Y, O, BL],
];

/// Home colors of each edge piece (indexed by piece id - 1)
pub const EDGE_PIECE_COLORS: [[Color; 2]; 12] = [
    [G, Y],
    [G, RD],
    [G, W],
    [G, O],
    [Y, RD],
    [W, RD],
    [W, O],
    [Y, O],
    [BL, Y],
    [BL, RD],
    [BL, W],
    [BL, O],
];

/// Corner slots whose orientation code is read against the opposite
/// reference face
const MIRRORED_CORNER_SLOTS: [usize; 4] = [0, 2, 5, 7];

/// Oriented colors of the corner piece `piece_id` sitting in `slot`.
///
/// `piece_id` is 1..=8 and `orientation` 1..=3, as guaranteed by a
/// validated [`RawState`](crate::domain::models::RawState).
pub(crate) fn project_corner(slot: usize, piece_id: u8, orientation: u8) -> [Color; 3] {
    let [c0, c1, c2] = CORNER_PIECE_COLORS[(piece_id - 1) as usize];

    let orientation = if orientation != 3 && MIRRORED_CORNER_SLOTS.contains(&slot) {
        3 - orientation
    } else {
        orientation
    };

    match orientation {
        1 => [c1, c2, c0],
        2 => [c2, c0, c1],
        _ => [c0, c1, c2],
    }
}

/// Oriented colors of the edge piece `piece_id`; a flipped edge shows its
/// colors in reverse order
pub(crate) fn project_edge(piece_id: u8, flipped: bool) -> [Color; 2] {
    let [c0, c1] = EDGE_PIECE_COLORS[(piece_id - 1) as usize];
    if flipped {
        [c1, c0]
    } else {
        [c0, c1]
    }
}
