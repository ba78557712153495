//! Domain layer - core business logic and entities

pub mod intent;
pub mod execution;
pub mod notification;
