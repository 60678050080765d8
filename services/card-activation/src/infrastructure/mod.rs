//! 基础设施层

pub mod cache;
pub mod health;
pub mod notification;
pub mod persistence;
