//! 持久化实现

mod memory;
mod migrations;
mod postgres_card_otp_repository;
mod postgres_card_repository;

pub use memory::*;
pub use migrations::migrations;
pub use postgres_card_otp_repository::*;
pub use postgres_card_repository::*;
