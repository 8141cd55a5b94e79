pub mod redis_client;
pub mod snapshot_store;
pub mod subscription;

pub use redis_client::RedisClient;
pub use snapshot_store::RedisSnapshotStore;
pub use subscription::RedisSubscriber;
