use crate::domain::models::RawState;
use crate::domain::notation::{self, CubeView};

/// Holds the latest decoded snapshot of the cube.
///
/// The snapshot is only ever replaced as a whole through [`apply`]; all
/// derived views are recomputed from it on every call.
///
/// [`apply`]: CubeStateModel::apply
#[derive(Debug, Default)]
pub struct CubeStateModel {
    state: Option<RawState>,
}

impl CubeStateModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, state: RawState) {
        self.state = Some(state);
    }

    /// Drop the snapshot, e.g. when the session ends
    pub fn clear(&mut self) {
        self.state = None;
    }

    pub fn raw(&self) -> Option<&RawState> {
        self.state.as_ref()
    }

    pub fn is_populated(&self) -> bool {
        self.state.is_some()
    }

    pub fn view(&self) -> Option<CubeView> {
        self.state.as_ref().map(notation::cube_view)
    }

    pub fn face_string(&self) -> Option<String> {
        self.state.as_ref().map(notation::face_string)
    }
}

/// One-shot check for the echo of the baseline read.
///
/// Right after subscribing, the cube may re-send the value that was just
/// read. The first notification is compared against the baseline bytes;
/// whatever the outcome, the check never runs again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineCheck {
    Pending(Vec<u8>),
    Cleared,
}

impl BaselineCheck {
    /// Consume the check. Returns `true` when `frame` is the baseline echo.
    pub fn is_echo(&mut self, frame: &[u8]) -> bool {
        match std::mem::replace(self, Self::Cleared) {
            Self::Pending(baseline) => baseline == frame,
            Self::Cleared => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_starts_empty() {
        let model = CubeStateModel::new();
        assert!(!model.is_populated());
        assert!(model.face_string().is_none());
        assert!(model.view().is_none());
    }

    #[test]
    fn test_apply_replaces_snapshot() {
        let mut model = CubeStateModel::new();
        model.apply(RawState::solved());
        assert_eq!(model.raw(), Some(&RawState::solved()));
        assert_eq!(
            model.face_string().as_deref(),
            Some("UUUUUUUUURRRRRRRRRFFFFFFFFFDDDDDDDDDLLLLLLLLLBBBBBBBBB")
        );
        model.clear();
        assert!(model.raw().is_none());
    }

    #[test]
    fn test_baseline_check_matches_once() {
        let mut check = BaselineCheck::Pending(vec![1, 2, 3]);
        assert!(check.is_echo(&[1, 2, 3]));
        assert_eq!(check, BaselineCheck::Cleared);
        assert!(!check.is_echo(&[1, 2, 3]));
    }

    #[test]
    fn test_baseline_check_clears_on_mismatch() {
        let mut check = BaselineCheck::Pending(vec![1, 2, 3]);
        assert!(!check.is_echo(&[1, 2, 4]));
        assert!(!check.is_echo(&[1, 2, 3]));
    }
}
