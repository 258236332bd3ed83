//! Artifact uploaders for finished clips and their metadata sidecars.

pub mod drive;
pub mod error;
pub mod object_store;
pub mod token_cache;
pub mod uploader;

pub use drive::{DriveConfig, DriveUploader};
pub use error::{StorageError, StorageResult};
pub use object_store::{ObjectStoreConfig, ObjectStoreUploader};
pub use token_cache::{AccessTokenSource, StaticToken, TokenCache};
pub use uploader::{content_type_for, ArtifactUploader, UploadOutcome};
