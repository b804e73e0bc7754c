use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    access::AccessGate,
    audit::{AuditEvent, AuditLogger},
    config::Config,
    domain::{CallerId, ImportTarget, StoredArtifact, TransferRequest, UserPreference},
    errors::Error,
    orchestrator::{ImportOrchestrator, RetryPolicy, RunOutcome},
    ports::RemoteLibrary,
    prefs::{JsonFileRepository, PreferenceRepository, PreferenceStore},
    transfer::FileTransfer,
    Result,
};

/// What one ingest call produced: the stored artifact plus, when auto-import
/// ran, its terminal outcome.
#[derive(Clone, Debug)]
pub struct TransferReport {
    pub artifact: StoredArtifact,
    pub import: Option<RunOutcome>,
    /// The one human-readable status line for the caller.
    pub message: String,
}

/// The single entry point combining the access gate, transfer validation,
/// storage and (when enabled) the remote-import orchestration.
pub struct IngestService {
    gate: AccessGate,
    transfer: FileTransfer,
    prefs: PreferenceStore,
    orchestrator: ImportOrchestrator,
    api: Arc<dyn RemoteLibrary>,
    auto_import: bool,
    default_target: ImportTarget,
    audit: AuditLogger,
}

impl IngestService {
    pub fn new(cfg: &Config, api: Arc<dyn RemoteLibrary>) -> Self {
        let audit = AuditLogger::new(&cfg.audit_log_path, cfg.audit_log_json);

        let repo: Option<Arc<dyn PreferenceRepository>> = cfg
            .preferences_file
            .as_ref()
            .map(|p| Arc::new(JsonFileRepository::new(p)) as Arc<dyn PreferenceRepository>);

        let policy = RetryPolicy {
            max_attempts: cfg.retry_attempts,
            retry_delay: cfg.retry_delay,
            run_timeout: cfg.import_timeout,
        };

        Self {
            gate: AccessGate::new(cfg.allowed_user_ids.clone(), audit.clone()),
            transfer: FileTransfer::new(
                cfg.download_folder.clone(),
                cfg.allowed_file_types.clone(),
                cfg.max_file_size_mb,
            ),
            prefs: PreferenceStore::new(repo),
            orchestrator: ImportOrchestrator::new(api.clone(), policy),
            api,
            auto_import: cfg.auto_import,
            default_target: cfg.default_target,
            audit,
        }
    }

    /// Validates, stores and (if enabled) imports one inbound file.
    ///
    /// Gate and policy rejections are terminal and reported verbatim; they
    /// are never retried here.
    pub async fn ingest(&self, caller: CallerId, req: TransferRequest) -> Result<TransferReport> {
        if !self.gate.is_allowed(caller) {
            return Err(Error::Unauthorized(caller.0));
        }

        // Best-effort advertised-size check before any bytes move.
        if let Some(declared) = req.declared_size {
            if !self.transfer.is_size_allowed(declared) {
                return Err(Error::SizeRejected {
                    size: declared,
                    limit_mb: self.transfer.max_file_size_mb(),
                });
            }
        }

        let artifact = match self
            .transfer
            .download(&req.source_url, &req.declared_name)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                self.audit_quietly(AuditEvent::error(caller.0, &e.to_string()));
                return Err(e);
            }
        };

        self.audit_quietly(AuditEvent::transfer(
            caller.0,
            &req.declared_name,
            &artifact.path,
            artifact.bytes_written,
        ));

        let import = if self.auto_import && self.api.is_configured() {
            info!(user_id = caller.0, filename = %req.declared_name, "triggering library import");
            // The caller's own selection wins over the configured default.
            let pref = self.prefs.get(caller).await;
            let target = if pref.has_library() {
                pref.import_target()
            } else {
                self.default_target
            };
            let outcome = self.orchestrator.run(target).await;
            if !outcome.is_success() {
                warn!(user_id = caller.0, filename = %req.declared_name, "import did not fully succeed");
            }
            self.audit_quietly(AuditEvent::import(
                caller.0,
                &req.declared_name,
                &outcome.user_message(),
            ));
            Some(outcome)
        } else {
            None
        };

        let message = match &import {
            Some(outcome) => outcome.user_message(),
            None => format!("✅ File '{}' downloaded successfully!", req.declared_name),
        };

        Ok(TransferReport {
            artifact,
            import,
            message,
        })
    }

    pub async fn select_preference(
        &self,
        caller: CallerId,
        library_id: i64,
        path_id: i64,
        library_name: &str,
        path_name: &str,
    ) {
        self.prefs
            .set(caller, library_id, path_id, library_name, path_name)
            .await
    }

    pub async fn clear_preference(&self, caller: CallerId) {
        self.prefs.clear(caller).await
    }

    pub async fn preference(&self, caller: CallerId) -> UserPreference {
        self.prefs.get(caller).await
    }

    pub fn remote(&self) -> &Arc<dyn RemoteLibrary> {
        &self.api
    }

    fn audit_quietly(&self, event: AuditEvent) {
        if let Err(e) = self.audit.write(event) {
            warn!(error = %e, "failed to write audit event");
        }
    }
}
