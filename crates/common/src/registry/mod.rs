//! Mutable pointers by public key
//!
//! A registry maps an ed25519 public key to the content id of the
//!  latest directory object published under it, together with a
//!  monotonically increasing revision. Signing and transport are the
//!  registry implementation's business; the directory layer only reads
//!  the current entry and publishes the next one.

mod memory;
mod provider;

pub use memory::MemoryRegistry;
pub use provider::{Registry, RegistryEntry, RegistryError, PUBLIC_KEY_SIZE};
