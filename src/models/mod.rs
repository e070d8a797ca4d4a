//! Data models for the lending server

pub mod enums;
pub mod loan;
pub mod maintenance;
pub mod notification;
pub mod report;
pub mod resource;
pub mod user;

// Re-export commonly used types
pub use enums::{
    LoanStatus, MaintenanceStatus, MaintenanceType, NotificationPriority, NotificationType,
    ResourceStatus, Role,
};
pub use loan::{Loan, LoanDetails};
pub use maintenance::{Incident, MaintenanceRecord};
pub use notification::{Notification, NotificationRule};
pub use report::{DamageReport, SuggestionReport};
pub use resource::Resource;
pub use user::{Actor, User};
