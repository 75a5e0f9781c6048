//! Token movements: NFT transfers, stablecoin transfers and allowances.

use super::{address_arg, is_zero, USDC_DECIMALS};
use crate::entities::{Approval, CurrencyTransaction, Transfer, TransferKind};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use evm_indexer_sdk::{
    format_address, format_hash, DecodedEvent, Entity, EntitySchema, EventHandler, HandlerContext,
    Result,
};
use tracing::debug;

/// Classifies a transfer by its zero-address endpoint.
#[must_use]
pub fn classify(from: &Address, to: &Address) -> TransferKind {
    if is_zero(from) {
        TransferKind::Mint
    } else if is_zero(to) {
        TransferKind::Burn
    } else {
        TransferKind::Transfer
    }
}

/// Renders a smallest-unit amount with `decimals` fractional digits.
#[must_use]
pub fn format_units(amount: U256, decimals: u8) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / scale;
    let fraction = amount % scale;
    if decimals == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = usize::from(decimals));
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// `SuperheroNFT.Transfer`.
pub struct NftTransferHandler;

#[async_trait]
impl EventHandler for NftTransferHandler {
    async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let from = event.args.address("from")?;
        let to = event.args.address("to")?;
        let transfer = Transfer {
            id: event.meta.log_id(),
            contract: format_address(&event.meta.address),
            token_id: event.args.uint("tokenId")?.to_string(),
            from: format_address(&from),
            to: format_address(&to),
            kind: classify(&from, &to),
            timestamp: event.meta.block_timestamp,
            transaction_hash: format_hash(&event.meta.transaction_hash),
            block_number: event.meta.block_number,
        };
        ctx.store.insert_if_absent(&transfer).await?;
        Ok(())
    }

    fn schemas(&self) -> Vec<EntitySchema> {
        vec![Transfer::schema()]
    }
}

/// Stablecoin `Transfer` and `Approval`.
///
/// Transfers are tagged by counterparty: the marketplace contract means a
/// purchase payment, the team contract means a stake.
pub struct CurrencyHandler {
    marketplace: Option<Address>,
    team_core: Option<Address>,
}

impl CurrencyHandler {
    #[must_use]
    pub fn new(marketplace: Option<Address>, team_core: Option<Address>) -> Self {
        Self {
            marketplace,
            team_core,
        }
    }

    /// Purpose tag of a transfer between `from` and `to`.
    #[must_use]
    pub fn purpose(&self, from: &Address, to: &Address) -> &'static str {
        let touches = |contract: Option<Address>| {
            contract.is_some_and(|address| address == *from || address == *to)
        };
        match classify(from, to) {
            TransferKind::Mint => "mint",
            TransferKind::Burn => "burn",
            TransferKind::Transfer if touches(self.marketplace) => "marketplace_payment",
            TransferKind::Transfer if touches(self.team_core) => "team_stake",
            TransferKind::Transfer => "transfer",
        }
    }

    async fn on_transfer(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let from = event.args.address("from")?;
        let to = event.args.address("to")?;
        let amount = event.args.uint("value")?;
        let purpose = self.purpose(&from, &to);
        debug!(
            amount = %format_units(amount, USDC_DECIMALS),
            purpose,
            "Stablecoin transfer"
        );

        let transaction = CurrencyTransaction {
            id: event.meta.log_id(),
            from: format_address(&from),
            to: format_address(&to),
            amount: amount.to_string(),
            purpose: purpose.to_string(),
            related_entity: None,
            timestamp: event.meta.block_timestamp,
            transaction_hash: format_hash(&event.meta.transaction_hash),
            block_number: event.meta.block_number,
        };
        ctx.store.insert_if_absent(&transaction).await?;
        Ok(())
    }

    /// Latest approval wins.
    async fn on_approval(event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let owner = address_arg(event, "owner")?;
        let spender = address_arg(event, "spender")?;
        let approval = Approval {
            id: Approval::key(&owner, &spender),
            owner,
            spender,
            amount: event.args.uint("value")?.to_string(),
            timestamp: event.meta.block_timestamp,
            transaction_hash: format_hash(&event.meta.transaction_hash),
            block_number: event.meta.block_number,
        };
        ctx.store.upsert(&approval).await
    }
}

#[async_trait]
impl EventHandler for CurrencyHandler {
    async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        match event.name.as_str() {
            "Transfer" => self.on_transfer(event, ctx).await,
            "Approval" => Self::on_approval(event, ctx).await,
            _ => Ok(()),
        }
    }

    fn schemas(&self) -> Vec<EntitySchema> {
        vec![CurrencyTransaction::schema(), Approval::schema()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET: Address = Address::repeat_byte(0x03);
    const TEAMS: Address = Address::repeat_byte(0x04);
    const ALICE: Address = Address::repeat_byte(0xa1);

    #[test]
    fn test_classify_by_zero_address() {
        assert_eq!(classify(&Address::ZERO, &ALICE), TransferKind::Mint);
        assert_eq!(classify(&ALICE, &Address::ZERO), TransferKind::Burn);
        assert_eq!(classify(&ALICE, &MARKET), TransferKind::Transfer);
    }

    #[test]
    fn test_purpose_tags() {
        let handler = CurrencyHandler::new(Some(MARKET), Some(TEAMS));
        assert_eq!(handler.purpose(&ALICE, &MARKET), "marketplace_payment");
        assert_eq!(handler.purpose(&TEAMS, &ALICE), "team_stake");
        assert_eq!(handler.purpose(&Address::ZERO, &ALICE), "mint");
        assert_eq!(handler.purpose(&ALICE, &Address::ZERO), "burn");
        assert_eq!(handler.purpose(&ALICE, &Address::repeat_byte(0xb0)), "transfer");
        assert_eq!(CurrencyHandler::new(None, None).purpose(&ALICE, &MARKET), "transfer");
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(500_000_000u64), 6), "500");
        assert_eq!(format_units(U256::from(1_250_000u64), 6), "1.25");
        assert_eq!(format_units(U256::from(7u64), 6), "0.000007");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }
}
