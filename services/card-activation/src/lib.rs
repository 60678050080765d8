//! 卡片激活服务
//!
//! 持卡人凭 PIN 申请一次性验证码（OTP），提交 OTP 后卡片转为激活状态。

pub mod api;
pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod error;
pub mod infrastructure;
