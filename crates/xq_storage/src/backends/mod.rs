pub mod files;
pub mod memory;
pub mod supabase;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use files::FileContentStore;
pub use memory::MemoryTenantStore;
pub use supabase::SupabaseTenantStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTenantStore;
