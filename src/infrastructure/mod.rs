//! Infrastructure layer - wallet signer and canister access

pub mod canister;
pub mod signer;
