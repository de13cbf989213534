pub mod supabase;

pub use supabase::{is_conflict_error, is_timeout_error, SupabaseClient};
