//! Message-acceptance policy: rate limiting, reputation, and allow/block
//! lists. Each submodule is independently testable; [`crate::routing`]
//! composes them into the Accept stage of the pipeline.

pub mod rate_limit;
pub mod relay_blocklist;
pub mod relay_reputation;
pub mod reputation;
pub mod spam_filter;
