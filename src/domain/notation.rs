//! Notation Formatter
//!
//! Renders a [`RawState`] as a per-piece color listing or as the
//! 54-character face string understood by cube solvers (`U`, `R`, `F`,
//! `D`, `L`, `B` blocks of nine stickers, row-major per face), and renders
//! decoded turns in algebraic notation.

use crate::domain::models::{Color, Face, RawState, Turn};
use crate::domain::projection::{project_corner, project_edge, CORNER_SLOT_FACES, EDGE_SLOT_FACES};
use serde::Serialize;

/// Face-string index of each corner sticker, per slot and sticker order
const CORNER_FACELETS: [[usize; 3]; 8] = [
    [29, 15, 26],
    [9, 8, 20],
    [6, 38, 18],
    [44, 27, 24],
    [17, 35, 51],
    [2, 11, 45],
    [36, 0, 47],
    [33, 42, 53],
];

/// Face-string index of each edge sticker, per slot and sticker order
const EDGE_FACELETS: [[usize; 2]; 12] = [
    [25, 28],
    [23, 12],
    [19, 7],
    [21, 41],
    [32, 16],
    [5, 10],
    [3, 37],
    [30, 43],
    [52, 34],
    [48, 14],
    [46, 1],
    [50, 39],
];

/// Centers never move, so their stickers are fixed
const CENTER_FACELETS: [(usize, Face); 6] = [
    (4, Face::U),
    (13, Face::R),
    (22, Face::F),
    (31, Face::D),
    (40, Face::L),
    (49, Face::B),
];

pub const FACELET_COUNT: usize = 54;

/// Corner slot as seen from outside: faces of the slot and the color
/// showing on each
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CornerView {
    pub position: [Face; 3],
    pub colors: [Color; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    pub position: [Face; 2],
    pub colors: [Color; 2],
}

/// Per-piece listing of the whole cube
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CubeView {
    pub corners: Vec<CornerView>,
    pub edges: Vec<EdgeView>,
}

/// Build the per-piece view of `state`.
///
/// A corner entry `{position: [D, R, F], colors: [yellow, red, green]}`
/// means yellow shows on D, red on R and green on F.
pub fn cube_view(state: &RawState) -> CubeView {
    let corners = state
        .corner_positions()
        .iter()
        .zip(state.corner_orientations())
        .enumerate()
        .map(|(slot, (&piece, &orientation))| CornerView {
            position: CORNER_SLOT_FACES[slot],
            colors: project_corner(slot, piece, orientation),
        })
        .collect();

    let edges = state
        .edge_positions()
        .iter()
        .zip(state.edge_orientations())
        .enumerate()
        .map(|(slot, (&piece, &flipped))| EdgeView {
            position: EDGE_SLOT_FACES[slot],
            colors: project_edge(piece, flipped),
        })
        .collect();

    CubeView { corners, edges }
}

/// Render `state` as the 54-character canonical face string
pub fn face_string(state: &RawState) -> String {
    let view = cube_view(state);
    let mut facelets = ['?'; FACELET_COUNT];

    for (slot, corner) in view.corners.iter().enumerate() {
        for (sticker, color) in corner.colors.iter().enumerate() {
            facelets[CORNER_FACELETS[slot][sticker]] = color.face().letter();
        }
    }

    for (slot, edge) in view.edges.iter().enumerate() {
        for (sticker, color) in edge.colors.iter().enumerate() {
            facelets[EDGE_FACELETS[slot][sticker]] = color.face().letter();
        }
    }

    for (index, face) in CENTER_FACELETS {
        facelets[index] = face.letter();
    }

    facelets.iter().collect()
}

/// Algebraic notation of a turn: `R`, `R2`, `R'` or `R2'`
pub fn move_notation(face: Face, turn: Turn) -> String {
    let suffix = match turn {
        Turn::Clockwise => "",
        Turn::Double => "2",
        Turn::CounterClockwise => "'",
        Turn::DoubleCounterClockwise => "2'",
    };
    format!("{}{}", face.letter(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLVED: &str = "UUUUUUUUURRRRRRRRRFFFFFFFFFDDDDDDDDDLLLLLLLLLBBBBBBBBB";

    #[test]
    fn test_solved_face_string() {
        assert_eq!(face_string(&RawState::solved()), SOLVED);
    }

    #[test]
    fn test_facelet_tables_cover_every_sticker_once() {
        let mut seen = [false; FACELET_COUNT];
        let all = CORNER_FACELETS
            .iter()
            .flatten()
            .chain(EDGE_FACELETS.iter().flatten())
            .copied()
            .chain(CENTER_FACELETS.iter().map(|(i, _)| *i));
        for index in all {
            assert!(!seen[index], "facelet {index} written twice");
            seen[index] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_facelets_land_in_their_face_block() {
        // Blocks are U, R, F, D, L, B
        let block = |face: Face| match face {
            Face::U => 0,
            Face::R => 1,
            Face::F => 2,
            Face::D => 3,
            Face::L => 4,
            Face::B => 5,
        };
        for (slot, faces) in CORNER_SLOT_FACES.iter().enumerate() {
            for (sticker, face) in faces.iter().enumerate() {
                assert_eq!(CORNER_FACELETS[slot][sticker] / 9, block(*face));
            }
        }
        for (slot, faces) in EDGE_SLOT_FACES.iter().enumerate() {
            for (sticker, face) in faces.iter().enumerate() {
                assert_eq!(EDGE_FACELETS[slot][sticker] / 9, block(*face));
            }
        }
    }

    #[test]
    fn test_flipped_edge_in_face_string() {
        let mut flips = [false; 12];
        flips[2] = true;
        let state = RawState::try_new(
            [1, 2, 3, 4, 5, 6, 7, 8],
            [3; 8],
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            flips,
        )
        .unwrap();
        let facelets: Vec<char> = face_string(&state).chars().collect();
        // Edge slot 2 (FU) writes index 19 on F and 7 on U
        assert_eq!(facelets[19], 'U');
        assert_eq!(facelets[7], 'F');
        assert_eq!(facelets[4], 'U');
    }

    #[test]
    fn test_cube_view_reports_slot_faces() {
        let view = cube_view(&RawState::solved());
        assert_eq!(view.corners.len(), 8);
        assert_eq!(view.edges.len(), 12);
        assert_eq!(view.corners[0].position, [Face::D, Face::R, Face::F]);
        assert_eq!(
            view.corners[0].colors,
            [Color::Yellow, Color::Red, Color::Green]
        );
        assert_eq!(view.edges[2].position, [Face::F, Face::U]);
        assert_eq!(view.edges[2].colors, [Color::Green, Color::White]);
    }

    #[test]
    fn test_move_notation() {
        assert_eq!(move_notation(Face::B, Turn::Clockwise), "B");
        assert_eq!(move_notation(Face::B, Turn::Double), "B2");
        assert_eq!(move_notation(Face::B, Turn::CounterClockwise), "B'");
        assert_eq!(move_notation(Face::B, Turn::DoubleCounterClockwise), "B2'");
    }
}
