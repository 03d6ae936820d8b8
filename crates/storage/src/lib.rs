#![forbid(unsafe_code)]

pub mod remote;
pub mod repository;
pub mod sqlite;

pub use remote::{RemoteConfig, RemoteStore};
pub use repository::{
    AttemptRecord, AttemptRepository, InMemoryRepository, LocalStateRepository, ProfileRecord,
    ProfileRepository, ProgressionRecord, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
