use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Numeric identity of the caller a transfer/import is performed for.
///
/// Membership in the allow-set is fixed for the process lifetime; see
/// [`crate::access::AccessGate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(pub i64);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One inbound file event. Consumed once; transport failures are not retried
/// at this layer.
#[derive(Clone, Debug)]
pub struct TransferRequest {
    pub source_url: String,
    pub declared_name: String,
    /// Advertised size, if the transport knows it. Checked best-effort before
    /// any bytes are fetched.
    pub declared_size: Option<u64>,
}

/// A file persisted under the storage root. The path is unique at creation
/// time and the file is never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Per-caller destination selection. The zero value means "no preference".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    pub library_id: i64,
    pub path_id: i64,
    #[serde(default)]
    pub library_name: String,
    #[serde(default)]
    pub path_name: String,
}

impl UserPreference {
    pub fn has_library(&self) -> bool {
        self.library_id > 0
    }

    /// Destination pinning for a finalize call; unset ids are not sent.
    pub fn import_target(&self) -> ImportTarget {
        ImportTarget {
            library_id: (self.library_id > 0).then_some(self.library_id),
            path_id: (self.path_id > 0).then_some(self.path_id),
        }
    }
}

/// Optional destination library/path for a finalize call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportTarget {
    pub library_id: Option<i64>,
    pub path_id: Option<i64>,
}

/// Remote-side processing state of a staged file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StagedStatus {
    New,
    Processed,
    Imported,
    Failed,
}

impl StagedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagedStatus::New => "NEW",
            StagedStatus::Processed => "PROCESSED",
            StagedStatus::Imported => "IMPORTED",
            StagedStatus::Failed => "FAILED",
        }
    }
}

/// A file the remote service has indexed but not yet promoted into its
/// permanent library. Owned entirely by the remote service; we only read it
/// and reference it by id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFile {
    pub id: i64,
    pub file_name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_size: i64,
    pub status: StagedStatus,
    #[serde(default)]
    pub date_added: String,
    #[serde(default)]
    pub date_scanned: String,
}

/// Spring-style page wrapper used by the staged-files listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
}

/// Terminal result of one finalize call. Ephemeral; never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub success: bool,
    #[serde(default)]
    pub imported_count: i64,
    #[serde(default)]
    pub failed_count: i64,
    #[serde(default)]
    pub imported_ids: Vec<i64>,
    #[serde(default)]
    pub failed_ids: Vec<i64>,
    #[serde(default)]
    pub message: String,
}

/// Staging-area counters returned by the notification endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    pub total_files: i64,
    pub new_files: i64,
    pub processed_files: i64,
    pub imported_files: i64,
    pub failed_files: i64,
}

/// A destination library on the remote service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Library {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub paths: Vec<LibraryPath>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryPath {
    pub id: i64,
    pub path: String,
}
