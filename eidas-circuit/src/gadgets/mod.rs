// eidas/eidas-circuit/src/gadgets/mod.rs
// Numan Thabit 2025

pub mod bytes;
pub mod ecdsa;
pub mod layout;
pub mod limbs;
pub mod point;
pub mod signature;
