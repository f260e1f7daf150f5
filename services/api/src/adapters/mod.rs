pub mod db;
pub mod memory;
pub mod notifier;

pub use db::DbAdapter;
pub use memory::MemoryAdapter;
pub use notifier::{spawn_worker, ChannelNotifier, LoggingRefreshHandler, RefreshHandler};
