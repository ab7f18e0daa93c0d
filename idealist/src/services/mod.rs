//! Services module
//!
//! Business logic services that coordinate between callers and the repository.

pub mod items;
pub mod lists;
pub mod subscriptions;
pub mod sync;
pub mod trash;

pub use items::ItemsService;
pub use lists::ListsService;
pub use subscriptions::SubscriptionsService;
pub use sync::SyncService;
pub use trash::{TrashService, TrashView, UndeleteSummary};
