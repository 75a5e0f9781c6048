//! `IdeaRegistry` events: idea creation and ratings.

use super::stats::{self, StatsDelta};
use super::{address_arg, id_arg, timestamp_arg};
use crate::entities::{Idea, PlatformStats, Rating};
use async_trait::async_trait;
use evm_indexer_sdk::{
    format_hash, DecodedEvent, Entity, EntitySchema, EventHandler, HandlerContext, IndexerError,
    Result,
};
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// Valid rating scores.
pub const RATING_RANGE: RangeInclusive<u8> = 1..=5;

pub struct IdeaHandler;

impl IdeaHandler {
    async fn on_created(event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let id = id_arg(event, "ideaId")?;
        if ctx.store.exists::<Idea>(&id).await? {
            debug!(idea = %id, "Idea already indexed");
            return Ok(());
        }

        let created_at = timestamp_arg(event)?;
        let idea = Idea {
            id,
            creator: address_arg(event, "creator")?,
            title: event.args.fixed_string("title")?,
            categories: event.args.string_list("categories")?,
            ipfs_hash: event.args.string("ipfsHash")?,
            price: event.args.uint("price")?.to_string(),
            rating_total: 0,
            num_raters: 0,
            is_purchased: false,
            created_at,
            transaction_hash: format_hash(&event.meta.transaction_hash),
            block_number: event.meta.block_number,
        };

        info!(idea = %idea.id, creator = %idea.creator, price = %idea.price, "Idea created");
        ctx.store.create(&idea).await?;
        stats::record(ctx.store, StatsDelta::Idea, created_at).await
    }

    /// Records one rating and bumps the idea's counters together.
    ///
    /// A second rating by the same rater, or a score outside
    /// [`RATING_RANGE`], is rejected and leaves the counters untouched.
    async fn on_rated(event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let idea_id = id_arg(event, "ideaId")?;
        let rater = address_arg(event, "rater")?;
        let score = event.args.u8("rating")?;
        if !RATING_RANGE.contains(&score) {
            return Err(IndexerError::ConstraintViolation(format!(
                "Rating {score} for idea {idea_id} is outside {RATING_RANGE:?}"
            )));
        }

        let key = Rating::key(&idea_id, &rater);
        if ctx.store.exists::<Rating>(&key).await? {
            return Err(IndexerError::ConstraintViolation(format!(
                "{rater} already rated idea {idea_id}"
            )));
        }

        ctx.store
            .modify::<Idea, _>(&idea_id, |idea| {
                idea.rating_total += u64::from(score);
                idea.num_raters += 1;
            })
            .await?;

        let comment = event.args.string("comment")?;
        let timestamp = event.meta.block_timestamp;
        let rating = Rating {
            id: key,
            idea: idea_id,
            rater,
            rating: score,
            comment: (!comment.is_empty()).then_some(comment),
            timestamp,
            transaction_hash: format_hash(&event.meta.transaction_hash),
        };
        ctx.store.create(&rating).await?;
        stats::record(ctx.store, StatsDelta::Rating, timestamp).await
    }
}

#[async_trait]
impl EventHandler for IdeaHandler {
    async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        match event.name.as_str() {
            "IdeaCreated" => Self::on_created(event, ctx).await,
            "IdeaRated" => Self::on_rated(event, ctx).await,
            _ => Ok(()),
        }
    }

    fn schemas(&self) -> Vec<EntitySchema> {
        vec![Idea::schema(), Rating::schema(), PlatformStats::schema()]
    }
}
