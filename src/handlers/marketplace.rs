//! `Marketplace` purchases.

use super::stats::{self, StatsDelta};
use super::{address_arg, id_arg, timestamp_arg};
use crate::entities::{Idea, PlatformStats, Purchase};
use async_trait::async_trait;
use evm_indexer_sdk::{
    format_hash, DecodedEvent, Entity, EntitySchema, EventHandler, HandlerContext, Result,
};
use serde_json::json;
use tracing::{debug, info, warn};

pub struct MarketplaceHandler;

impl MarketplaceHandler {
    /// Records the purchase under `"{tx}-{log index}"` and flips the idea's
    /// purchased flag. A redelivered event finds its purchase row and
    /// changes nothing.
    async fn on_purchased(event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let idea_id = id_arg(event, "ideaId")?;
        let price = event.args.uint("price")?;
        let timestamp = timestamp_arg(event)?;

        let purchase = Purchase {
            id: event.meta.log_id(),
            idea: idea_id.clone(),
            buyer: address_arg(event, "buyer")?,
            seller: address_arg(event, "seller")?,
            price: price.to_string(),
            timestamp,
            transaction_hash: format_hash(&event.meta.transaction_hash),
            block_number: event.meta.block_number,
        };
        if !ctx.store.insert_if_absent(&purchase).await? {
            debug!(purchase = %purchase.id, "Purchase already recorded");
            return Ok(());
        }

        match ctx.store.get::<Idea>(&idea_id).await? {
            Some(idea) if !idea.is_purchased => {
                ctx.store
                    .update::<Idea>(&idea_id, json!({ "isPurchased": true }))
                    .await?;
            }
            Some(_) => {}
            None => warn!(idea = %idea_id, "Purchase references an unindexed idea"),
        }

        info!(idea = %idea_id, buyer = %purchase.buyer, %price, "Idea purchased");
        stats::record(ctx.store, StatsDelta::Purchase { price }, timestamp).await
    }
}

#[async_trait]
impl EventHandler for MarketplaceHandler {
    async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        match event.name.as_str() {
            "IdeaPurchased" => Self::on_purchased(event, ctx).await,
            _ => Ok(()),
        }
    }

    fn schemas(&self) -> Vec<EntitySchema> {
        vec![Purchase::schema(), Idea::schema(), PlatformStats::schema()]
    }
}
