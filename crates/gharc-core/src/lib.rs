pub mod config;
pub mod credential;
pub mod logging;

pub mod archive;
pub mod codec;
pub mod error;
pub mod layout;
pub mod monitor;
pub mod retry;
pub mod store;

pub use archive::{ArchiveEntry, ArchiveService, CreatedArchive, EditableArchive, UploadTask};
pub use codec::{FileLink, RepoCoords};
pub use error::StoreError;
