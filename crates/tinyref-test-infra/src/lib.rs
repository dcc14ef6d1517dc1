//! Disposable backing stores for integration tests.
//!
//! Each fixture owns its container; dropping the fixture tears the
//! container down. Tests create what they need and let scope end it.

pub mod error;
pub mod mysql;
pub mod redis;

pub use error::{Result, TestInfraError};
pub use mysql::{MySqlServer, MysqlConfig};
pub use redis::RedisServer;
