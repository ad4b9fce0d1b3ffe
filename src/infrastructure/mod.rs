//! Infrastructure layer - external adapters (database, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod account_manager;
pub mod config;
pub mod places;

pub use account_manager::LocalAccountManager;
pub use config::{
    config_file_path, ensure_config_exists, load_config, load_config_from_file,
    save_config_to_file, SettingsFile,
};
pub use places::PlacesDb;
