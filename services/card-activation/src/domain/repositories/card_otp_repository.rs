//! OTP 仓储接口

use async_trait::async_trait;
use cardgate_common::{CardId, CardOtpId, ProfileId};
use cardgate_errors::AppResult;
use chrono::{DateTime, Utc};

use crate::domain::entities::CardOtp;

/// 兑换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    /// OTP 已标记使用，卡片已激活
    Activated,
    /// OTP 已被使用（或被新码作废），未做任何修改
    OtpAlreadyUsed,
    /// 卡片已激活，OTP 保持原状
    CardAlreadyActive,
}

/// OTP 仓储接口
#[async_trait]
pub trait CardOtpRepository: Send + Sync {
    /// 写入新 OTP，并在同一事务内将该卡片所有未使用的旧 OTP 标记为已使用
    ///
    /// 返回被作废的旧记录数量。
    async fn issue(&self, otp: &CardOtp) -> AppResult<u64>;

    /// 卡片最近签发的一条 OTP（不论是否已使用或过期）
    async fn find_latest_for_card(&self, card_id: &CardId) -> AppResult<Option<CardOtp>>;

    /// 标记 OTP 已使用并激活所属卡片，两者要么都生效要么都不生效
    ///
    /// `used` 与 `is_active` 都以比较并交换的方式修改，并发兑换只有一个得到
    /// `Activated`。返回错误时两条记录均未改变。
    async fn redeem(
        &self,
        id: &CardOtpId,
        card_id: &CardId,
        activated_at: DateTime<Utc>,
        activated_by: Option<&ProfileId>,
    ) -> AppResult<Redemption>;
}
