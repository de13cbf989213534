pub mod conflict;
pub mod consultation;
pub mod ledger;
pub mod lifecycle;
pub mod notify;

pub use conflict::ConflictChecker;
pub use consultation::ConsultationAuthorizer;
pub use ledger::AppointmentLedgerService;
pub use lifecycle::LifecycleService;
pub use notify::NotificationService;
