//! Compatibility scoring between two profiles
//!
//! Pure functions, no I/O. Scores:
//!
//! | Condition                                      | Points |
//! |------------------------------------------------|--------|
//! | same grief type                                | +3     |
//! | same grief stage                               | +2     |
//! | different stage, candidate's is complementary  | +1     |
//!
//! Complementary stages are directed: the requester's stage decides which
//! candidate stages earn the bonus.

use std::fmt;
use std::str::FromStr;

use crate::db::schemas::ProfileDoc;

pub const GRIEF_TYPE_POINTS: u32 = 3;
pub const SAME_STAGE_POINTS: u32 = 2;
pub const COMPLEMENTARY_STAGE_POINTS: u32 = 1;

/// Known grief stage labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GriefStage {
    EarlyGrief,
    WorkingThroughIt,
    Acceptance,
    Reconstruction,
}

impl GriefStage {
    pub fn label(&self) -> &'static str {
        match self {
            GriefStage::EarlyGrief => "Early Grief",
            GriefStage::WorkingThroughIt => "Working Through It",
            GriefStage::Acceptance => "Acceptance",
            GriefStage::Reconstruction => "Reconstruction",
        }
    }

    /// Candidate stages that complement this one
    pub fn complementary(&self) -> &'static [GriefStage] {
        use GriefStage::*;
        match self {
            EarlyGrief => &[WorkingThroughIt, Acceptance],
            WorkingThroughIt => &[Acceptance, Reconstruction],
            Acceptance => &[Reconstruction, WorkingThroughIt],
            Reconstruction => &[Acceptance],
        }
    }
}

impl fmt::Display for GriefStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GriefStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Early Grief" => Ok(GriefStage::EarlyGrief),
            "Working Through It" => Ok(GriefStage::WorkingThroughIt),
            "Acceptance" => Ok(GriefStage::Acceptance),
            "Reconstruction" => Ok(GriefStage::Reconstruction),
            other => Err(format!("unknown grief stage: {}", other)),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Score a candidate for a requester; 0 means "do not suggest"
///
/// Missing attributes never match.
pub fn compatibility_score(user: &ProfileDoc, candidate: &ProfileDoc) -> u32 {
    let mut score = 0;

    if let (Some(a), Some(b)) = (present(&user.grief_type), present(&candidate.grief_type)) {
        if a == b {
            score += GRIEF_TYPE_POINTS;
        }
    }

    if let (Some(a), Some(b)) = (present(&user.grief_stage), present(&candidate.grief_stage)) {
        if a == b {
            score += SAME_STAGE_POINTS;
        } else if let (Ok(mine), Ok(theirs)) = (a.parse::<GriefStage>(), b.parse::<GriefStage>()) {
            if mine.complementary().contains(&theirs) {
                score += COMPLEMENTARY_STAGE_POINTS;
            }
        }
    }

    score
}

/// Whether `candidate_id`'s profile may be suggested to `user_id`
pub fn is_eligible(user_id: &str, candidate_id: &str, candidate: &ProfileDoc) -> bool {
    candidate_id != user_id && candidate.allow_matching
}
