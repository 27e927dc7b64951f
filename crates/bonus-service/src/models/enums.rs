//! 积分账本枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化，
//! 未知取值在反序列化阶段即被拒绝。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 积分变动原因
///
/// 仅用于展示和审计，不影响余额计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum BonusReason {
    /// 购票奖励
    Purchase,
    /// 订单支付抵扣
    OrderPayment,
    /// 客服调整
    SupportAdjustment,
    /// 邀请奖励
    Referral,
    /// 注册奖励
    Registration,
}

impl BonusReason {
    pub const ALL: [BonusReason; 5] = [
        Self::Purchase,
        Self::OrderPayment,
        Self::SupportAdjustment,
        Self::Referral,
        Self::Registration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::OrderPayment => "order_payment",
            Self::SupportAdjustment => "support_adjustment",
            Self::Referral => "referral",
            Self::Registration => "registration",
        }
    }
}

impl fmt::Display for BonusReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BonusReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("未知的积分变动原因: {}", s))
    }
}

/// 账本操作类型
///
/// 标识产生该流水的变更操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum OperationKind {
    /// 获得积分（+）
    Earn,
    /// 使用积分（-），需余额充足
    Apply,
    /// 人工调整（±），调整后余额不得为负
    Adjust,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Apply => "apply",
            Self::Adjust => "adjust",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serde_uses_snake_case() {
        let json = serde_json::to_string(&BonusReason::OrderPayment).unwrap();
        assert_eq!(json, "\"order_payment\"");

        let reason: BonusReason = serde_json::from_str("\"support_adjustment\"").unwrap();
        assert_eq!(reason, BonusReason::SupportAdjustment);
    }

    #[test]
    fn test_reason_rejects_unknown_value() {
        assert!(serde_json::from_str::<BonusReason>("\"cashback\"").is_err());
        assert!("PURCHASE".parse::<BonusReason>().is_err());
    }

    #[test]
    fn test_reason_from_str_matches_display() {
        for reason in BonusReason::ALL {
            assert_eq!(reason.to_string().parse::<BonusReason>(), Ok(reason));
        }
    }

    #[test]
    fn test_operation_kind_display() {
        assert_eq!(OperationKind::Earn.to_string(), "earn");
        assert_eq!(OperationKind::Apply.to_string(), "apply");
        assert_eq!(
            serde_json::to_string(&OperationKind::Adjust).unwrap(),
            "\"adjust\""
        );
    }
}
