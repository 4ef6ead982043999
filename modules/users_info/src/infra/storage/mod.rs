pub mod document;
pub mod json_repo;
pub mod json_store;
pub mod mapper;

pub use document::{user_key, UserDocument, UserRecord};
pub use json_repo::JsonUsersRepository;
pub use json_store::{JsonFileStore, StoreError, StoreOp};
