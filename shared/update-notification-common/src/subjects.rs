//! NATS Subject Patterns for plugin update management
//!
//! ```text
//! updates.entity.updated               # A plugin was updated on disk
//! updates.entity.restart_required      # A plugin asks for a host restart
//! updates.self.available               # The update manager itself is outdated
//! updates.commands                     # Chat commands (request/reply)
//! updates.service.{operation}          # Update service requests (request/reply)
//! updates.service.status               # Status snapshots pushed by the update service
//! ```

pub const ENTITY_UPDATED: &str = "updates.entity.updated";
pub const RESTART_REQUIRED: &str = "updates.entity.restart_required";
pub const SELF_UPDATE_AVAILABLE: &str = "updates.self.available";
pub const COMMANDS: &str = "updates.commands";
pub const SERVICE_STATUS: &str = "updates.service.status";

/// Update service operations reachable over request/reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOperation {
    Register,
    Configure,
    CheckAll,
    CheckOne,
    Stop,
}

impl ServiceOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceOperation::Register => "register",
            ServiceOperation::Configure => "configure",
            ServiceOperation::CheckAll => "check_all",
            ServiceOperation::CheckOne => "check_one",
            ServiceOperation::Stop => "stop",
        }
    }
}

/// Update service request subject
///
/// Example: `updates.service.check_all`
pub fn service(operation: ServiceOperation) -> String {
    format!("updates.service.{}", operation.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_subjects() {
        assert_eq!(service(ServiceOperation::CheckAll), "updates.service.check_all");
        assert_eq!(service(ServiceOperation::CheckOne), "updates.service.check_one");
        assert_eq!(service(ServiceOperation::Register), "updates.service.register");
    }

    #[test]
    fn test_entity_subjects_share_prefix() {
        assert!(ENTITY_UPDATED.starts_with("updates.entity."));
        assert!(RESTART_REQUIRED.starts_with("updates.entity."));
    }
}
