use tracing::{info, warn};

use crate::{
    audit::{AuditEvent, AuditLogger},
    domain::CallerId,
};

/// Fixed allow-set access gate. Membership is decided at construction and
/// never changes for the process lifetime.
///
/// `is_allowed` never errors: absence from the set is a normal `false`
/// result. Each decision is recorded in the audit trail; an audit write
/// failure must not turn a decision into an error.
pub struct AccessGate {
    allowed_user_ids: Vec<i64>,
    audit: AuditLogger,
}

impl AccessGate {
    pub fn new(allowed_user_ids: Vec<i64>, audit: AuditLogger) -> Self {
        Self {
            allowed_user_ids,
            audit,
        }
    }

    pub fn is_allowed(&self, caller: CallerId) -> bool {
        let granted = self.allowed_user_ids.contains(&caller.0);

        if granted {
            info!(user_id = caller.0, "user access granted");
        } else {
            warn!(user_id = caller.0, "unauthorized access attempt");
        }

        if let Err(e) = self.audit.write(AuditEvent::auth(caller.0, granted)) {
            warn!(user_id = caller.0, error = %e, "failed to write auth audit event");
        }

        granted
    }

    pub fn allowed_count(&self) -> usize {
        self.allowed_user_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_gate(allowed: Vec<i64>) -> AccessGate {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis();
        let pid = std::process::id();
        let path = PathBuf::from(format!("/tmp/bookdrop-access-test-{pid}-{ts}.log"));
        AccessGate::new(allowed, AuditLogger::new(path, true))
    }

    #[test]
    fn member_is_allowed() {
        let gate = test_gate(vec![1, 2, 3]);
        assert!(gate.is_allowed(CallerId(2)));
    }

    #[test]
    fn non_member_is_denied() {
        let gate = test_gate(vec![1, 2, 3]);
        assert!(!gate.is_allowed(CallerId(4)));
    }

    #[test]
    fn empty_allow_set_denies_everyone() {
        let gate = test_gate(vec![]);
        assert!(!gate.is_allowed(CallerId(1)));
        assert_eq!(gate.allowed_count(), 0);
    }

    #[test]
    fn decisions_are_audited() {
        let gate = test_gate(vec![5]);
        gate.is_allowed(CallerId(5));
        gate.is_allowed(CallerId(6));

        let written = std::fs::read_to_string(gate.audit.path()).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("\"authorized\":true"));
        assert!(written.contains("\"authorized\":false"));
    }
}
