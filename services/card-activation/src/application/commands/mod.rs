//! 命令与查询定义

mod create_card_command;
mod get_card_status_query;
mod request_otp_command;
mod verify_otp_command;

pub use create_card_command::*;
pub use get_card_status_query::*;
pub use request_otp_command::*;
pub use verify_otp_command::*;
