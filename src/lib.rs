//! quiver: the shared client core of the archery club membership and training tracker.
//!
//! - `identity`: page-load session guard, local session store, identity verification,
//!   coalesced login redirects and the page catalog.
//! - `profiles`: profile CRUD and member listing with placeholder fallbacks.
//! - `templates`: cached template fetching.
//! - `cli`: the `quiver` command-line front end.

pub mod config;
pub mod error;
pub mod identity;
pub mod profiles;
pub mod templates;
pub mod cli;
