// Profile reconciliation engine.
// Flow: raw payload -> normalize -> identity -> merge -> coordinator -> summary.
// All persistence goes through one owner-scoped store transaction.

pub mod candidates;
pub mod coordinator;
pub mod handlers;
pub mod identity;
pub mod merge;
pub mod normalize;
pub mod summary;
