//! Case folder aggregation and final disposition.

use chrono::{DateTime, FixedOffset};

use super::domain::{
    CaseFolder, CaseRuleViolation, FinalOutcome, FolderState, FolderSummary, Requirement,
};
use crate::workflows::directory::ApplicantId;

/// Whole-number percentage of approved requirements; 0 for an empty folder.
pub fn progress(requirements: &[Requirement]) -> u8 {
    if requirements.is_empty() {
        return 0;
    }
    let approved = requirements.iter().filter(|r| r.is_approved()).count();
    ((approved * 100) / requirements.len()) as u8
}

pub fn all_approved(requirements: &[Requirement]) -> bool {
    !requirements.is_empty() && requirements.iter().all(Requirement::is_approved)
}

impl CaseFolder {
    pub fn open(applicant: ApplicantId, at: DateTime<FixedOffset>) -> Self {
        Self {
            applicant,
            state: FolderState::Open,
            observations: None,
            opened_at: at,
            closed_at: None,
        }
    }

    pub fn ensure_mutable(&self) -> Result<(), CaseRuleViolation> {
        if self.state.is_closed() {
            Err(CaseRuleViolation::FolderClosed(self.state))
        } else {
            Ok(())
        }
    }

    /// Moves between open and approved to match the requirement states.
    /// Returns whether the state changed; closed folders never change.
    pub fn refresh(&mut self, requirements: &[Requirement]) -> bool {
        let next = match self.state {
            FolderState::Open if all_approved(requirements) => FolderState::Approved,
            FolderState::Approved if !all_approved(requirements) => FolderState::Open,
            _ => return false,
        };
        self.state = next;
        true
    }

    pub fn record_final_result(
        &mut self,
        outcome: FinalOutcome,
        reason: Option<&str>,
        at: DateTime<FixedOffset>,
    ) -> Result<(), CaseRuleViolation> {
        self.ensure_mutable()?;
        if self.state != FolderState::Approved {
            return Err(CaseRuleViolation::FolderNotApproved(self.state));
        }

        match outcome {
            FinalOutcome::Accepted => {
                self.state = FolderState::ClosedAccepted;
                self.observations = None;
            }
            FinalOutcome::Rejected => {
                let reason = reason
                    .map(str::trim)
                    .filter(|reason| !reason.is_empty())
                    .ok_or(CaseRuleViolation::MissingRejectionReason)?;
                self.state = FolderState::ClosedRejected;
                self.observations = Some(reason.to_string());
            }
        }
        self.closed_at = Some(at);
        Ok(())
    }

    pub fn summary(&self, requirements: &[Requirement]) -> FolderSummary {
        FolderSummary {
            applicant_id: self.applicant.clone(),
            state: self.state.label(),
            progress: progress(requirements),
            approved: requirements.iter().filter(|r| r.is_approved()).count(),
            total: requirements.len(),
            observations: self.observations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::casework::domain::{RequirementId, RequirementState};

    fn at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-10T11:00:00-05:00").expect("valid")
    }

    fn requirements(states: &[RequirementState]) -> Vec<Requirement> {
        states
            .iter()
            .enumerate()
            .map(|(index, state)| {
                let mut requirement = Requirement::missing(
                    RequirementId(format!("req-{index}")),
                    ApplicantId("applicant-1".to_string()),
                    format!("code_{index}"),
                    format!("Requirement {index}"),
                );
                requirement.state = *state;
                requirement
            })
            .collect()
    }

    #[test]
    fn progress_rounds_down_and_handles_empty() {
        use RequirementState::*;
        assert_eq!(progress(&[]), 0);
        assert_eq!(progress(&requirements(&[Approved, Missing, PendingReview])), 33);
        assert_eq!(progress(&requirements(&[Approved, Approved])), 100);
    }

    #[test]
    fn refresh_follows_requirement_states() {
        use RequirementState::*;
        let mut folder = CaseFolder::open(ApplicantId("applicant-1".to_string()), at());
        assert!(!folder.refresh(&[]));
        assert!(!folder.refresh(&requirements(&[Approved, Missing])));

        assert!(folder.refresh(&requirements(&[Approved, Approved])));
        assert_eq!(folder.state, FolderState::Approved);

        assert!(folder.refresh(&requirements(&[Approved, Approved, Missing])));
        assert_eq!(folder.state, FolderState::Open);
    }

    #[test]
    fn final_result_requires_approved_folder() {
        let mut folder = CaseFolder::open(ApplicantId("applicant-1".to_string()), at());
        assert_eq!(
            folder.record_final_result(FinalOutcome::Accepted, None, at()),
            Err(CaseRuleViolation::FolderNotApproved(FolderState::Open))
        );

        folder.state = FolderState::Approved;
        assert_eq!(
            folder.record_final_result(FinalOutcome::Rejected, Some("  "), at()),
            Err(CaseRuleViolation::MissingRejectionReason)
        );

        folder
            .record_final_result(FinalOutcome::Rejected, Some("insufficient funds"), at())
            .expect("closes");
        assert_eq!(folder.state, FolderState::ClosedRejected);
        assert_eq!(folder.observations.as_deref(), Some("insufficient funds"));
        assert_eq!(folder.closed_at, Some(at()));

        assert_eq!(
            folder.record_final_result(FinalOutcome::Accepted, None, at()),
            Err(CaseRuleViolation::FolderClosed(FolderState::ClosedRejected))
        );
        assert!(!folder.refresh(&requirements(&[RequirementState::Missing])));
    }
}
