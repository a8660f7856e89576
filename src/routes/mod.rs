/// Router Module Index
///
/// Splits the HTTP surface by how requests are treated on the way in:
/// the open API, the guarded view paths, and the development-only proxy.

/// Health, route table and session endpoints. No guard applied.
pub mod public;

/// Every other GET path, resolved through the route table and gated by the
/// navigation guard.
pub mod views;

/// `/api/*` forwarding to the remote roster API. Mounted in `Env::Local` only.
pub mod dev_proxy;
