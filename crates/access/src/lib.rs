//! Access policy for tutorgate: where credentials and quota balances live,
//! and the resolver that turns a tenant into a ready-to-use model access.

pub mod memory;
pub mod resolver;
pub mod sqlite;
pub mod store;

pub use memory::MemoryCredentialStore;
pub use resolver::{AccessResolver, ResolveOptions, SystemAccess};
pub use sqlite::SqliteCredentialStore;
pub use store::CredentialStore;
