pub mod client;
pub mod helpers;
pub mod memory;
pub mod multipart;
pub mod store;
pub mod upload;

pub use client::S3Client;
pub use memory::{MemoryStore, StoreCall, StoredObject};
pub use multipart::MULTIPART_THRESHOLD;
pub use store::{
    Headers, ObjectStore, RedirectProtocol, RoutingRule, UploadedObject, WebsiteConfig,
};
