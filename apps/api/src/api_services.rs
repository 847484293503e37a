mod database;
mod redis;

pub use database::connect_and_migrate;
pub use redis::build_redis_client;
