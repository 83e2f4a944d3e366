//! Persistence layer. Every submodule is written against [`sqlx::AnyPool`]
//! so the same code path serves both the Postgres and SQLite backends
//! selected by `DATABASE_URL` at startup (see [`pool::create_pool`]).

pub mod agents;
pub mod audit;
pub mod contacts;
pub mod domain_verification;
pub mod federation;
pub mod handshakes;
pub mod messages;
pub mod pool;
pub mod relay_blocklist;
pub mod relay_reputation;
pub mod reputation;
pub mod retry;
pub mod schema;
pub mod spam;
pub mod webhooks;
