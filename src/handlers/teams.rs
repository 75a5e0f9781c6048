//! `TeamCore` events: team creation, membership and status.

use super::stats::{self, StatsDelta};
use super::{address_arg, id_arg, timestamp_arg};
use crate::entities::{PlatformStats, Team, TeamMember, TeamStatus};
use async_trait::async_trait;
use evm_indexer_sdk::{
    format_hash, DecodedEvent, Entity, EntitySchema, EventHandler, HandlerContext, IndexerError,
    Result,
};
use serde_json::json;
use tracing::{debug, info};

const DEFAULT_ROLE: &str = "member";
const LEADER_ROLE: &str = "leader";

pub struct TeamHandler;

impl TeamHandler {
    /// Creates the team with its leader as the first active member.
    async fn on_created(event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let id = id_arg(event, "teamId")?;
        if ctx.store.exists::<Team>(&id).await? {
            debug!(team = %id, "Team already indexed");
            return Ok(());
        }

        let leader = address_arg(event, "leader")?;
        let created_at = timestamp_arg(event)?;
        let transaction_hash = format_hash(&event.meta.transaction_hash);
        let team = Team {
            id: id.clone(),
            leader: leader.clone(),
            name: event.args.fixed_string("name")?,
            description: event.args.string("description")?,
            project_name: event.args.fixed_string("projectName")?,
            required_members: event.args.u64("requiredMembers")?,
            current_members: 1,
            required_stake: event.args.uint("requiredStake")?.to_string(),
            roles: event.args.string_list("roles")?,
            tags: event.args.string_list("tags")?,
            status: TeamStatus::Active,
            created_at,
            transaction_hash: transaction_hash.clone(),
            block_number: event.meta.block_number,
        };
        let member = TeamMember {
            id: TeamMember::key(&id, &leader),
            team: id,
            member: leader,
            role: LEADER_ROLE.to_string(),
            joined_at: created_at,
            stake_amount: "0".to_string(),
            is_active: true,
            transaction_hash,
        };

        info!(team = %team.id, leader = %team.leader, name = %team.name, "Team created");
        ctx.store.create(&team).await?;
        ctx.store.create(&member).await?;
        stats::record(ctx.store, StatsDelta::Team, created_at).await
    }

    async fn on_joined(event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let team_id = id_arg(event, "teamId")?;
        let member = address_arg(event, "member")?;
        let key = TeamMember::key(&team_id, &member);
        if ctx.store.exists::<TeamMember>(&key).await? {
            return Err(IndexerError::ConstraintViolation(format!(
                "{member} already joined team {team_id}"
            )));
        }

        ctx.store
            .modify::<Team, _>(&team_id, |team| team.current_members += 1)
            .await?;

        let role = event.args.fixed_string("role")?;
        let joined = TeamMember {
            id: key,
            team: team_id,
            member,
            role: if role.is_empty() {
                DEFAULT_ROLE.to_string()
            } else {
                role
            },
            joined_at: timestamp_arg(event)?,
            stake_amount: event.args.uint("stakeAmount")?.to_string(),
            is_active: true,
            transaction_hash: format_hash(&event.meta.transaction_hash),
        };
        ctx.store.create(&joined).await
    }

    async fn on_status_changed(event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let team_id = id_arg(event, "teamId")?;
        let code = event.args.u8("status")?;
        let status = TeamStatus::from_code(code).ok_or_else(|| {
            IndexerError::ConstraintViolation(format!("Unknown status {code} for team {team_id}"))
        })?;
        ctx.store
            .update::<Team>(&team_id, json!({ "status": status }))
            .await
    }
}

#[async_trait]
impl EventHandler for TeamHandler {
    async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        match event.name.as_str() {
            "TeamCreated" => Self::on_created(event, ctx).await,
            "MemberJoined" => Self::on_joined(event, ctx).await,
            "TeamStatusChanged" => Self::on_status_changed(event, ctx).await,
            _ => Ok(()),
        }
    }

    fn schemas(&self) -> Vec<EntitySchema> {
        vec![Team::schema(), TeamMember::schema(), PlatformStats::schema()]
    }
}
