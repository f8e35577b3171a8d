//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod artifactory_authorization_client;
mod in_memory_authorization_client;
mod in_memory_role_record_repository;
mod postgres_role_record_repository;
mod redis_role_record_repository;

pub use artifactory_authorization_client::{
    ArtifactoryApiVersion, ArtifactoryAuthorizationClient, ArtifactoryClientConfig,
};
pub use in_memory_authorization_client::InMemoryAuthorizationClient;
pub use in_memory_role_record_repository::InMemoryRoleRecordRepository;
pub use postgres_role_record_repository::PostgresRoleRecordRepository;
pub use redis_role_record_repository::RedisRoleRecordRepository;
