use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Callback categories the processor delivers. Field spelling follows the
/// processor's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackCategory {
    #[serde(rename = "deposit")]
    Deposit,
    #[serde(rename = "withdraw")]
    Withdraw,
    #[serde(rename = "withdrawalPendingConfirm")]
    WithdrawPendingConfirm,
}

impl CallbackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::WithdrawPendingConfirm => "withdrawalPendingConfirm",
        }
    }
}

/// Final accept/reject decision carried by a settlement callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Success,
    Fail,
    /// Processor flagged the order for confirmation; not terminal.
    PendingConfirm,
}

/// Inbound callback body, decoded from the base64 transport encoding after
/// signature verification. Unknown `businessType` values are kept as raw
/// strings so forward-compatible categories can be acknowledged without
/// failing the decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCallback {
    #[serde(rename = "businessType")]
    pub business_type: String,
    #[serde(rename = "userOrder")]
    pub user_order: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(rename = "orderStatus", default)]
    pub order_status: Option<String>,
    /// Payer identity, deposit callbacks only.
    #[serde(rename = "payUser", default)]
    pub pay_user: Option<String>,
    /// Recipient identity, withdrawal callbacks only.
    #[serde(rename = "toUserId", default)]
    pub to_user_id: Option<u64>,
}

impl GatewayCallback {
    pub fn category(&self) -> Option<CallbackCategory> {
        match self.business_type.as_str() {
            "deposit" => Some(CallbackCategory::Deposit),
            "withdraw" => Some(CallbackCategory::Withdraw),
            "withdrawalPendingConfirm" => Some(CallbackCategory::WithdrawPendingConfirm),
            _ => None,
        }
    }

    /// The processor reports "success"/"fail" in `orderStatus`; a deposit
    /// callback with no status means success (the processor only notifies
    /// deposits once settled).
    pub fn outcome(&self) -> CallbackOutcome {
        match self.order_status.as_deref() {
            Some("fail") => CallbackOutcome::Fail,
            _ => CallbackOutcome::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let raw = r#"{
            "businessType": "deposit",
            "userOrder": "topup_1_a0",
            "amount": "100",
            "orderStatus": "success",
            "payUser": "9527"
        }"#;
        let cb: GatewayCallback = serde_json::from_str(raw).unwrap();

        assert_eq!(cb.category(), Some(CallbackCategory::Deposit));
        assert_eq!(cb.user_order, "topup_1_a0");
        assert_eq!(cb.outcome(), CallbackOutcome::Success);
        assert_eq!(cb.pay_user.as_deref(), Some("9527"));
    }

    #[test]
    fn test_unknown_category_still_decodes() {
        let raw = r#"{"businessType": "merchantAudit", "userOrder": "x"}"#;
        let cb: GatewayCallback = serde_json::from_str(raw).unwrap();
        assert_eq!(cb.category(), None);
        assert_eq!(cb.business_type, "merchantAudit");
    }

    #[test]
    fn test_fail_outcome() {
        let raw = r#"{"businessType": "withdraw", "userOrder": "w", "orderStatus": "fail"}"#;
        let cb: GatewayCallback = serde_json::from_str(raw).unwrap();
        assert_eq!(cb.outcome(), CallbackOutcome::Fail);
    }
}
