//! Domain layer - core types and configuration.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (DB, IO, etc.).

pub mod account;
pub mod error;
pub mod models;
pub mod sync;

pub use account::{Account, AccountStatus, AuthType, LoginOrigin, Profile};
pub use error::{AppError, Result};
pub use models::{
    BookmarkNode, BookmarkNodeType, PageObservation, VisitInfo, VisitType, DESKTOP_ROOT_GUID,
    MENU_ROOT_GUID, MOBILE_ROOT_GUID, ROOT_GUID, TOOLBAR_ROOT_GUID, UNFILED_ROOT_GUID,
};
pub use sync::{
    AccountConfig, AppConfig, EngineConfig, PathConfig, RootTitles, SyncConfig, SyncEngine,
    SyncFailure, SyncPhase, SyncReason, SyncState,
};
