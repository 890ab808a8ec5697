use super::domain::{
    CaseFolder, DocumentId, DocumentVersion, FolderState, Requirement, RequirementId,
};
use crate::workflows::directory::ApplicantId;
use crate::workflows::persistence::RepositoryError;

/// Requirement, version and folder storage.
///
/// The two `commit_*` operations are the only writers of document versions. Each must
/// re-check its gate against the stored records and apply both writes under one lock
/// (or transaction), so two concurrent uploads or reviews of the same requirement
/// cannot both succeed.
///
/// Every requirement and version write also fails with `FolderClosed` once the
/// applicant's stored folder is closed, checked under the same lock.
pub trait CaseRepository: Send + Sync {
    /// Fails with [`Constraint::RequirementPerApplicant`](crate::workflows::Constraint::RequirementPerApplicant)
    /// when the applicant already holds the same requirement code.
    fn insert_requirement(&self, requirement: Requirement) -> Result<Requirement, RepositoryError>;
    fn fetch_requirement(&self, id: &RequirementId)
        -> Result<Option<Requirement>, RepositoryError>;
    /// In assignment order.
    fn requirements_for_applicant(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Vec<Requirement>, RepositoryError>;
    /// Refuses with [`Constraint::RequirementInUse`](crate::workflows::Constraint::RequirementInUse)
    /// while any version exists.
    fn delete_requirement(&self, id: &RequirementId) -> Result<Requirement, RepositoryError>;

    /// Ordered by version number.
    fn versions(&self, requirement: &RequirementId)
        -> Result<Vec<DocumentVersion>, RepositoryError>;
    fn fetch_version(&self, id: &DocumentId) -> Result<Option<DocumentVersion>, RepositoryError>;

    /// Stores a new version together with the gated requirement.
    ///
    /// Rejects with `UploadGate` when the stored requirement has uploads disabled or its
    /// latest version is not `missing`, and with `VersionPerRequirement` unless the new
    /// number is exactly the stored latest plus one.
    fn commit_upload(
        &self,
        requirement: Requirement,
        version: DocumentVersion,
    ) -> Result<DocumentVersion, RepositoryError>;

    /// Stores a reviewed version and its requirement; `ReviewState` unless the stored
    /// version is still pending review.
    fn commit_review(
        &self,
        version: DocumentVersion,
        requirement: Requirement,
    ) -> Result<(), RepositoryError>;

    /// `FolderPerApplicant` when one already exists.
    fn insert_folder(&self, folder: CaseFolder) -> Result<CaseFolder, RepositoryError>;
    fn fetch_folder(&self, applicant: &ApplicantId) -> Result<Option<CaseFolder>, RepositoryError>;
    /// Stores `folder` only if the stored state still equals `expected`. `FolderState` when it
    /// moved, or when the new state is approved or closed while some requirement of the
    /// applicant is not approved.
    fn transition_folder(
        &self,
        expected: FolderState,
        folder: CaseFolder,
    ) -> Result<(), RepositoryError>;

    fn latest_version(
        &self,
        requirement: &RequirementId,
    ) -> Result<Option<DocumentVersion>, RepositoryError> {
        Ok(self.versions(requirement)?.pop())
    }
}
