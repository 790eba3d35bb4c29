pub mod text;
pub mod units;
pub mod xbrl;

#[cfg(test)]
pub mod tests;

pub use text::normalize;
pub use xbrl::{extract_facts, extract_structured};
