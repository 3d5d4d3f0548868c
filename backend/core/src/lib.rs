pub mod error;
pub mod traits;
pub mod types;

pub use error::GateError;
pub use traits::{ApprovalHandler, DenyAll, StaticApproval};
pub use types::{
    ApprovalRequest, AuditRecord, Classification, ExecStatus, ExecutionOutcome, RiskLevel,
    SecurityContext,
};
