use serde::Serialize;

use longcut_core::RejectKind;

/// Per-tier progress. Transitions only move forward; `Rejected` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Entered,
    Identified,
    Validated,
    Transformed,
    Audited,
    Passed,
    Rejected(RejectKind),
    Cancelled,
}

impl PipelineState {
    fn rank(self) -> u8 {
        match self {
            PipelineState::Entered => 0,
            PipelineState::Identified => 1,
            PipelineState::Validated => 2,
            PipelineState::Transformed => 3,
            PipelineState::Audited => 4,
            PipelineState::Passed => 5,
            PipelineState::Rejected(_) | PipelineState::Cancelled => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Passed | PipelineState::Rejected(_) | PipelineState::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Entered => "entered",
            PipelineState::Identified => "identified",
            PipelineState::Validated => "validated",
            PipelineState::Transformed => "transformed",
            PipelineState::Audited => "audited",
            PipelineState::Passed => "passed",
            PipelineState::Rejected(_) => "rejected",
            PipelineState::Cancelled => "cancelled",
        }
    }
}

impl Serialize for PipelineState {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}
