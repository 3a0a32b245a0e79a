pub mod error;
pub mod finance;
pub mod record;
pub mod translit;

pub use error::RunError;
pub use finance::{compute_totals, recompute_after_link, round2, safe_decimal};
pub use record::{FieldKey, Record};
