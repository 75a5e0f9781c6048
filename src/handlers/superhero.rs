//! `SuperheroNFT` profile events.

use super::stats::{self, StatsDelta};
use super::{address_arg, id_arg, timestamp_arg};
use crate::enrichment::{Enrichment, ProfileEnricher};
use crate::entities::{PendingRoles, PlatformStats, Superhero};
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, B256};
use async_trait::async_trait;
use evm_indexer_sdk::{
    format_hash, DecodedEvent, Entity, EntitySchema, EventHandler, HandlerContext, IndexerError,
    Result,
};
use tracing::{debug, info, warn};

/// Access-control roles the contract is known to use.
const KNOWN_ROLES: &[&str] = &["SUPERHERO_ROLE", "MINTER_ROLE", "MODERATOR_ROLE", "PAUSER_ROLE"];

/// Human-readable name of a role id, or its hex form if unknown.
#[must_use]
pub fn role_name(role: &B256) -> String {
    if role.is_zero() {
        return "DEFAULT_ADMIN_ROLE".to_string();
    }
    KNOWN_ROLES
        .iter()
        .find(|name| keccak256(name.as_bytes()) == *role)
        .map_or_else(|| format_hash(role), |name| (*name).to_string())
}

fn role_arg(event: &DecodedEvent) -> Result<B256> {
    match event.args.get("role") {
        Some(DynSolValue::FixedBytes(word, 32)) => Ok(*word),
        _ => Err(IndexerError::DecodingError(
            "argument 'role' is not a bytes32".to_string(),
        )),
    }
}

/// Adds or removes `role`. Returns `false` when `roles` is unchanged.
fn apply_role(roles: &mut Vec<String>, role: String, granted: bool) -> bool {
    let held = roles.contains(&role);
    match (granted, held) {
        (true, false) => roles.push(role),
        (false, true) => roles.retain(|r| *r != role),
        _ => return false,
    }
    true
}

pub struct SuperheroHandler {
    enricher: ProfileEnricher,
}

impl SuperheroHandler {
    #[must_use]
    pub fn new(enricher: ProfileEnricher) -> Self {
        Self { enricher }
    }

    async fn on_created(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        let address = event.args.address("superhero")?;
        let id = address_arg(event, "superhero")?;
        if ctx.store.exists::<Superhero>(&id).await? {
            debug!(superhero = %id, "Superhero already indexed");
            return Ok(());
        }

        let roles = Self::take_pending_roles(ctx, &id, event.meta.block_number).await?;
        let superhero_id = id_arg(event, "id")?;
        let log_name = event.args.fixed_string("name")?;
        let created_at = timestamp_arg(event)?;
        let transaction_hash = format_hash(&event.meta.transaction_hash);
        let block_number = event.meta.block_number;

        let superhero = match self
            .enricher
            .fetch(ctx.reader, address, event.meta.block_number)
            .await
        {
            Enrichment::Full(profile) => Superhero {
                id,
                superhero_id,
                name: if profile.name.is_empty() {
                    log_name
                } else {
                    profile.name
                },
                bio: profile.bio,
                avatar_url: profile.avatar_url,
                reputation: profile.reputation,
                skills: profile.skills,
                specialities: profile.specialities,
                roles,
                flagged: profile.flagged,
                created_at,
                transaction_hash,
                block_number,
            },
            Enrichment::Partial { reason } => {
                debug!(superhero = %id, %reason, "Persisting superhero without profile data");
                Superhero {
                    id,
                    superhero_id,
                    name: log_name,
                    bio: String::new(),
                    avatar_url: None,
                    reputation: 0,
                    skills: Vec::new(),
                    specialities: Vec::new(),
                    roles,
                    flagged: false,
                    created_at,
                    transaction_hash,
                    block_number,
                }
            }
        };

        info!(superhero = %superhero.id, name = %superhero.name, "Superhero created");
        ctx.store.create(&superhero).await?;
        stats::record(ctx.store, StatsDelta::Superhero, created_at).await
    }

    /// Roles staged for `account` before its profile existed; clears the stage.
    async fn take_pending_roles(
        ctx: &mut HandlerContext<'_>,
        account: &str,
        block_number: u64,
    ) -> Result<Vec<String>> {
        let Some(pending) = ctx.store.get::<PendingRoles>(account).await? else {
            return Ok(Vec::new());
        };
        if !pending.roles.is_empty() {
            ctx.store
                .upsert(&PendingRoles {
                    id: pending.id,
                    roles: Vec::new(),
                    block_number,
                })
                .await?;
        }
        Ok(pending.roles)
    }

    async fn on_role(
        &self,
        event: &DecodedEvent,
        ctx: &mut HandlerContext<'_>,
        granted: bool,
    ) -> Result<()> {
        let account = address_arg(event, "account")?;
        let role = role_name(&role_arg(event)?);

        if let Some(mut superhero) = ctx.store.get::<Superhero>(&account).await? {
            if apply_role(&mut superhero.roles, role, granted) {
                ctx.store.upsert(&superhero).await?;
            }
            return Ok(());
        }

        debug!(%account, %role, granted, "Staging role change until the profile exists");
        let mut pending = ctx
            .store
            .get::<PendingRoles>(&account)
            .await?
            .unwrap_or_else(|| PendingRoles {
                id: account,
                roles: Vec::new(),
                block_number: event.meta.block_number,
            });
        if apply_role(&mut pending.roles, role, granted) {
            pending.block_number = event.meta.block_number;
            ctx.store.upsert(&pending).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for SuperheroHandler {
    async fn handle(&self, event: &DecodedEvent, ctx: &mut HandlerContext<'_>) -> Result<()> {
        match event.name.as_str() {
            "SuperheroCreated" => self.on_created(event, ctx).await,
            "RoleGranted" => self.on_role(event, ctx, true).await,
            "RoleRevoked" => self.on_role(event, ctx, false).await,
            other => {
                warn!(event = other, "SuperheroHandler received an unexpected event");
                Ok(())
            }
        }
    }

    async fn on_rollback(&self, _ancestor_block: u64) -> Result<()> {
        self.enricher.clear();
        Ok(())
    }

    async fn on_halt(&self) {
        self.enricher.clear();
    }

    fn schemas(&self) -> Vec<EntitySchema> {
        vec![
            Superhero::schema(),
            PendingRoles::schema(),
            PlatformStats::schema(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(role_name(&B256::ZERO), "DEFAULT_ADMIN_ROLE");
        assert_eq!(role_name(&keccak256("MINTER_ROLE")), "MINTER_ROLE");
        let unknown = B256::repeat_byte(0x11);
        assert_eq!(role_name(&unknown), format_hash(&unknown));
    }

    #[test]
    fn test_apply_role_is_idempotent() {
        let mut roles = Vec::new();
        assert!(apply_role(&mut roles, "MINTER_ROLE".into(), true));
        assert!(!apply_role(&mut roles, "MINTER_ROLE".into(), true));
        assert_eq!(roles, vec!["MINTER_ROLE"]);
        assert!(!apply_role(&mut roles, "PAUSER_ROLE".into(), false));
        assert!(apply_role(&mut roles, "MINTER_ROLE".into(), false));
        assert!(roles.is_empty());
    }
}
