pub mod aarch64;

pub use aarch64::generate;
