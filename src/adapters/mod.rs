//! Port implementations: the hosted Supabase project and an in-memory stand-in.
pub mod memory;
pub mod supabase;

pub use memory::{FailPoint, MemoryBackend};
pub use supabase::SupabaseClient;
