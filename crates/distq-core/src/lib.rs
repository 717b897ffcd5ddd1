#![forbid(unsafe_code)]
//! distq-core: shared vocabulary for every other distq crate.
//!
//! Pure data only: schemas, scalar values, tuples, ids, configuration and
//! the core error type. No networking, no operators.

pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    #[test]
    fn error_type_is_reachable_from_the_crate_root() {
        let r: crate::Result<()> = Err(crate::Error::Schema("no such column".into()));
        assert!(matches!(r, Err(crate::Error::Schema(m)) if m == "no such column"));
    }
}
