use async_trait::async_trait;

use crate::{
    domain::{
        ImportOutcome, ImportTarget, Library, NotificationSummary, Page, StagedFile, StagedStatus,
    },
    errors::ApiResult,
};

/// Page size used when finalizing everything in the staging area.
pub const FINALIZE_ALL_PAGE_SIZE: u32 = 1000;

/// Hexagonal port for the remote library-import service.
///
/// Implementations are stateless request/response mappers; each call is
/// bounded by the implementation's per-call timeout. An unconfigured
/// implementation must fail fast with [`crate::ApiError::Unconfigured`]
/// instead of attempting a request.
#[async_trait]
pub trait RemoteLibrary: Send + Sync {
    /// True when base URL and credential are both present.
    fn is_configured(&self) -> bool;

    /// Triggers the remote service to re-index its staging area.
    async fn rescan(&self) -> ApiResult<()>;

    /// Lists staged files; `status = None` returns them regardless of status.
    async fn staged_files(
        &self,
        status: Option<StagedStatus>,
        page: u32,
        size: u32,
    ) -> ApiResult<Page<StagedFile>>;

    /// Promotes the given staged files into the permanent library, optionally
    /// pinned to a destination library/path.
    async fn finalize(&self, file_ids: &[i64], target: ImportTarget) -> ApiResult<ImportOutcome>;

    async fn notification_summary(&self) -> ApiResult<NotificationSummary>;

    async fn libraries(&self) -> ApiResult<Vec<Library>>;

    /// Convenience composition: finalize every currently staged file.
    ///
    /// An empty staging area yields a synthetic successful outcome with zero
    /// counts; finalize is never called with an empty id list.
    async fn finalize_all(&self, target: ImportTarget) -> ApiResult<ImportOutcome> {
        let staged = self.staged_files(None, 0, FINALIZE_ALL_PAGE_SIZE).await?;

        if staged.content.is_empty() {
            return Ok(ImportOutcome {
                success: true,
                imported_count: 0,
                failed_count: 0,
                imported_ids: Vec::new(),
                failed_ids: Vec::new(),
                message: "No files to import".to_string(),
            });
        }

        let file_ids: Vec<i64> = staged.content.iter().map(|f| f.id).collect();
        self.finalize(&file_ids, target).await
    }
}
