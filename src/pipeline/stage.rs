use crate::error::CrmError;

pub const DEFAULT_SUB_PIPELINE: &str = "Sales Pipeline Standard";

/// Stages of the standard sales sub-pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Qualification,
    NeedsAnalysis,
    ProposalPriceQuote,
    NegotiationReview,
    ClosedWon,
    ClosedLost,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Qualification,
        Stage::NeedsAnalysis,
        Stage::ProposalPriceQuote,
        Stage::NegotiationReview,
        Stage::ClosedWon,
        Stage::ClosedLost,
    ];

    /// Default advance path. Terminal stages are reached only through
    /// explicit win/lose transitions.
    pub const ADVANCE_SEQUENCE: [Stage; 4] = [
        Stage::Qualification,
        Stage::NeedsAnalysis,
        Stage::ProposalPriceQuote,
        Stage::NegotiationReview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qualification => "Qualification",
            Self::NeedsAnalysis => "Needs Analysis",
            Self::ProposalPriceQuote => "Proposal/Price Quote",
            Self::NegotiationReview => "Negotiation/Review",
            Self::ClosedWon => "Closed Won",
            Self::ClosedLost => "Closed Lost",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }

    /// Exact, case-sensitive match against the stage names the service uses.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == raw)
    }

    pub fn next(self) -> Option<Self> {
        let index = Self::ADVANCE_SEQUENCE
            .iter()
            .position(|stage| *stage == self)?;
        Self::ADVANCE_SEQUENCE.get(index + 1).copied()
    }

    pub fn valid_stage_list() -> String {
        Self::ALL.map(Stage::as_str).join(", ")
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_stage(stage: &str) -> Result<Stage, CrmError> {
    Stage::parse(stage).ok_or_else(|| CrmError::InvalidStage {
        stage: stage.to_string(),
    })
}

pub fn next_stage(current: &str) -> Option<Stage> {
    Stage::parse(current)?.next()
}

/// `true` when `stage` names a closed stage. Unknown names are not terminal.
pub fn is_terminal_name(stage: &str) -> bool {
    Stage::parse(stage).is_some_and(Stage::is_terminal)
}
