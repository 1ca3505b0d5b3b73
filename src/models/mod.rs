pub mod session;
pub mod signal;

pub use session::{AccountType, SessionConfig, SessionForm, SessionStatus, MAX_PAIRS};
pub use signal::{AnalysisRequest, SignalAction, SignalEvent, SignalOutcome};
