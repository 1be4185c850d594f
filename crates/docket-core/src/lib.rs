pub mod case;
pub mod config;
pub mod date;
pub mod detect;
pub mod monitoring;
pub mod normalize;

pub use case::{Appeal, CaseSnapshot, Hearing, Party};
pub use config::{ConfigError, MonitorConfig};
pub use date::normalize_date;
pub use detect::{ChangeReport, detect, has_changed};
pub use monitoring::{
    CaseStatus, MonitoredCase, MonitoredCaseId, Notification, NotificationId, NotificationKind,
    UserId,
};
pub use normalize::{OneOrMany, RawCaseRecord, normalize};
