pub mod logging;
pub mod natural_sort;

pub use logging::truncate_text;
pub use natural_sort::{natural_cmp, natural_sort_key};
