mod change_record;
mod record;
mod sync_config;
mod sync_report;

pub use change_record::{ChangeRecord, NewChange};
pub use record::Record;
pub use sync_config::SyncConfig;
pub use sync_report::SyncReport;
