//! Top-level facade crate for Kataribe.
//!
//! Re-exports the protocol core and the runtime so users can depend on a
//! single crate.

pub mod core {
    pub use kataribe_core::*;
}

pub mod runtime {
    pub use kataribe_runtime::*;
}
