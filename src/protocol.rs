//! C9 — Protocol Filter.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Protocol {
    Unknown,
    UniswapV2,
    UniswapV3,
    SushiSwap,
    Curve,
    Balancer,
    AaveV2,
    AaveV3,
    Compound,
    Maker,
    OneInch,
    Paraswap,
    CowSwap,
    Stargate,
    Hop,
    Across,
    Yearn,
    Convex,
    Lido,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Unknown => "unknown",
            Protocol::UniswapV2 => "uniswap_v2",
            Protocol::UniswapV3 => "uniswap_v3",
            Protocol::SushiSwap => "sushiswap",
            Protocol::Curve => "curve",
            Protocol::Balancer => "balancer",
            Protocol::AaveV2 => "aave_v2",
            Protocol::AaveV3 => "aave_v3",
            Protocol::Compound => "compound",
            Protocol::Maker => "maker",
            Protocol::OneInch => "1inch",
            Protocol::Paraswap => "paraswap",
            Protocol::CowSwap => "cowswap",
            Protocol::Stargate => "stargate",
            Protocol::Hop => "hop",
            Protocol::Across => "across",
            Protocol::Yearn => "yearn",
            Protocol::Convex => "convex",
            Protocol::Lido => "lido",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OperationType {
    Unknown,
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidate,
    FlashLoanArbitrage,
    FlashLoanCollateralSwap,
    Stake,
    Unstake,
    ClaimRewards,
    Governance,
    Bridge,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Unknown => "unknown",
            OperationType::Swap => "swap",
            OperationType::AddLiquidity => "add_liquidity",
            OperationType::RemoveLiquidity => "remove_liquidity",
            OperationType::Deposit => "deposit",
            OperationType::Withdraw => "withdraw",
            OperationType::Borrow => "borrow",
            OperationType::Repay => "repay",
            OperationType::Liquidate => "liquidate",
            OperationType::FlashLoanArbitrage => "flash_loan_arbitrage",
            OperationType::FlashLoanCollateralSwap => "flash_loan_collateral_swap",
            OperationType::Stake => "stake",
            OperationType::Unstake => "unstake",
            OperationType::ClaimRewards => "claim_rewards",
            OperationType::Governance => "governance",
            OperationType::Bridge => "bridge",
        }
    }

    fn is_safe(&self) -> bool {
        matches!(
            self,
            OperationType::Swap
                | OperationType::AddLiquidity
                | OperationType::Deposit
                | OperationType::Stake
                | OperationType::ClaimRewards
                | OperationType::Governance
        )
    }

    fn is_flash_loan_exempt(&self) -> bool {
        matches!(
            self,
            OperationType::FlashLoanArbitrage | OperationType::FlashLoanCollateralSwap | OperationType::Liquidate
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OperationBounds {
    pub max_gas: u64,
    pub max_unique_contracts: u32,
    pub max_value_usd: f64,
}

/// Registries and bounds the protocol filter consults. Passed in at
/// construction rather than kept as ambient globals, per the shared-
/// registries design note, so tests can vary them and a new deployment's
/// router addresses don't require a code change.
#[derive(Debug, Clone, Default)]
pub struct ProtocolConfig {
    pub protocol_addresses: HashMap<[u8; 20], Protocol>,
    pub operation_selectors: HashMap<[u8; 4], OperationType>,
    pub operation_bounds: HashMap<OperationType, OperationBounds>,
    /// Fixed price used to approximate `max_value_usd` from native units.
    pub native_unit_price_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProtocolFilterResult {
    pub protocol: Protocol,
    pub operation: OperationType,
    pub risk_adjustment: f64,
    pub within_bounds: bool,
}

impl Default for ProtocolFilterResult {
    fn default() -> Self {
        Self { protocol: Protocol::Unknown, operation: OperationType::Unknown, risk_adjustment: 0.0, within_bounds: true }
    }
}

fn bounds_ok(
    bounds: Option<&OperationBounds>,
    gas_used: u64,
    unique_contracts: u32,
    value_native: u128,
    price_usd: f64,
) -> bool {
    let Some(b) = bounds else { return true };
    let value_usd = (value_native as f64 / 1e18) * price_usd;
    gas_used <= b.max_gas && unique_contracts <= b.max_unique_contracts && value_usd <= b.max_value_usd
}

/// Computes the additive risk adjustment per §4.8's rule table, clamped to
/// [-0.5, 0.5]. `has_flash_loan` and the usage stats come from the feature
/// record; the caller supplies them rather than this module reaching back
/// into C2/C5 itself.
pub fn filter(
    to: Option<&[u8; 20]>,
    selector: Option<&[u8; 4]>,
    has_flash_loan: bool,
    gas_used: u64,
    unique_contracts: u32,
    value_native: u128,
    cfg: &ProtocolConfig,
) -> ProtocolFilterResult {
    let protocol = to.and_then(|a| cfg.protocol_addresses.get(a)).copied().unwrap_or(Protocol::Unknown);
    let operation = selector.and_then(|s| cfg.operation_selectors.get(s)).copied().unwrap_or(OperationType::Unknown);

    let protocol_known = protocol != Protocol::Unknown;
    let operation_known = operation != OperationType::Unknown;
    let bounds = cfg.operation_bounds.get(&operation);
    let within_bounds = bounds_ok(bounds, gas_used, unique_contracts, value_native, cfg.native_unit_price_usd);

    let mut adjustment = 0.0f64;

    if protocol_known && operation_known {
        adjustment += -0.20;
        adjustment += if within_bounds { -0.10 } else { 0.25 };
    } else if !protocol_known && !operation_known {
        adjustment += 0.0;
    } else {
        if !protocol_known {
            adjustment += -0.05;
        }
        if !operation_known {
            adjustment += -0.05;
        }
    }

    if has_flash_loan && !operation.is_flash_loan_exempt() {
        adjustment += 0.35;
    }

    if protocol_known && operation.is_safe() && within_bounds && !has_flash_loan {
        adjustment += -0.10;
    }

    ProtocolFilterResult { protocol, operation, risk_adjustment: adjustment.clamp(-0.5, 0.5), within_bounds }
}

/// Applies the adjustment to a raw score: the adjustment scales with the
/// raw score itself so low-scoring traffic can't be pushed negative and
/// high-scoring traffic can't overshoot one. Preserved as specified, not
/// switched to an additive form.
pub fn apply_adjustment(raw_score: f64, adjustment: f64) -> f64 {
    (raw_score + adjustment * raw_score).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_protocol_and_operation_yield_zero_adjustment() {
        let cfg = ProtocolConfig::default();
        let res = filter(None, None, false, 0, 0, 0, &cfg);
        assert_eq!(res.risk_adjustment, 0.0);
    }

    #[test]
    fn flash_loan_outside_exempt_operations_adds_penalty() {
        let mut cfg = ProtocolConfig::default();
        let to = [9u8; 20];
        cfg.protocol_addresses.insert(to, Protocol::UniswapV2);
        let res = filter(Some(&to), None, true, 0, 0, 0, &cfg);
        assert!(res.risk_adjustment > 0.0);
    }

    #[test]
    fn adjustment_is_always_clamped() {
        let mut cfg = ProtocolConfig::default();
        let to = [9u8; 20];
        let sel = [1u8; 4];
        cfg.protocol_addresses.insert(to, Protocol::AaveV2);
        cfg.operation_selectors.insert(sel, OperationType::Withdraw);
        let res = filter(Some(&to), Some(&sel), true, u64::MAX, u32::MAX, u128::MAX, &cfg);
        assert!(res.risk_adjustment >= -0.5 && res.risk_adjustment <= 0.5);
    }

    #[test]
    fn apply_adjustment_never_leaves_unit_interval() {
        assert_eq!(apply_adjustment(0.9, 0.5), 1.0_f64.min(0.9 + 0.45));
        assert!(apply_adjustment(0.01, -0.5) >= 0.0);
    }
}
