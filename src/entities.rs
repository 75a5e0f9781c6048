//! Marketplace data model.
//!
//! Every entity serializes to a camelCase JSON document. Addresses are
//! lowercase `0x` hex, 256-bit amounts are decimal strings in the currency's
//! smallest unit, and reference fields hold the primary key of the entity
//! they point at without being enforced.

use evm_indexer_sdk::{Entity, EntitySchema, FieldDef, FieldType};
use serde::{Deserialize, Serialize};

macro_rules! impl_entity {
    ($ty:ident, [$(($field:literal, $fty:expr)),* $(,)?]) => {
        impl Entity for $ty {
            const KIND: &'static str = stringify!($ty);

            fn id(&self) -> String {
                self.id.clone()
            }

            fn schema() -> EntitySchema {
                EntitySchema {
                    name: Self::KIND,
                    fields: vec![$(FieldDef::new($field, $fty)),*],
                }
            }
        }
    };
}

/// A registered profile, keyed by the holder's address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Superhero {
    pub id: String,
    pub superhero_id: String,
    pub name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub reputation: u64,
    pub skills: Vec<String>,
    pub specialities: Vec<String>,
    /// Access-control roles currently held, by name.
    pub roles: Vec<String>,
    pub flagged: bool,
    pub created_at: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl_entity!(Superhero, [
    ("id", FieldType::Address),
    ("superheroId", FieldType::BigInt),
    ("name", FieldType::String),
    ("bio", FieldType::String),
    ("avatarUrl", FieldType::String),
    ("reputation", FieldType::Int),
    ("skills", FieldType::StringList),
    ("specialities", FieldType::StringList),
    ("roles", FieldType::StringList),
    ("flagged", FieldType::Bool),
    ("createdAt", FieldType::Int),
    ("transactionHash", FieldType::Hash),
    ("blockNumber", FieldType::Int),
]);

/// Roles granted to an address before its profile was created, keyed by
/// address. Emptied once the profile picks them up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRoles {
    pub id: String,
    pub roles: Vec<String>,
    pub block_number: u64,
}

impl_entity!(PendingRoles, [
    ("id", FieldType::Address),
    ("roles", FieldType::StringList),
    ("blockNumber", FieldType::Int),
]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub creator: String,
    pub title: String,
    pub categories: Vec<String>,
    /// Opaque off-chain content pointer.
    pub ipfs_hash: String,
    pub price: String,
    pub rating_total: u64,
    pub num_raters: u64,
    pub is_purchased: bool,
    pub created_at: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl_entity!(Idea, [
    ("id", FieldType::BigInt),
    ("creator", FieldType::Reference("Superhero")),
    ("title", FieldType::String),
    ("categories", FieldType::StringList),
    ("ipfsHash", FieldType::String),
    ("price", FieldType::BigInt),
    ("ratingTotal", FieldType::Int),
    ("numRaters", FieldType::Int),
    ("isPurchased", FieldType::Bool),
    ("createdAt", FieldType::Int),
    ("transactionHash", FieldType::Hash),
    ("blockNumber", FieldType::Int),
]);

/// Lifecycle of a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamStatus {
    Active,
    Completed,
    Cancelled,
}

impl TeamStatus {
    /// Maps the on-chain status code. Unknown codes yield `None`.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TeamStatus::Active),
            1 => Some(TeamStatus::Completed),
            2 => Some(TeamStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub leader: String,
    pub name: String,
    pub description: String,
    pub project_name: String,
    pub required_members: u64,
    /// Starts at 1 for the leader; only grows through joins.
    pub current_members: u64,
    pub required_stake: String,
    pub roles: Vec<String>,
    pub tags: Vec<String>,
    pub status: TeamStatus,
    pub created_at: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl_entity!(Team, [
    ("id", FieldType::BigInt),
    ("leader", FieldType::Reference("Superhero")),
    ("name", FieldType::String),
    ("description", FieldType::String),
    ("projectName", FieldType::String),
    ("requiredMembers", FieldType::Int),
    ("currentMembers", FieldType::Int),
    ("requiredStake", FieldType::BigInt),
    ("roles", FieldType::StringList),
    ("tags", FieldType::StringList),
    ("status", FieldType::String),
    ("createdAt", FieldType::Int),
    ("transactionHash", FieldType::Hash),
    ("blockNumber", FieldType::Int),
]);

/// Membership of one address in one team, keyed `"{team}-{member}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub team: String,
    pub member: String,
    pub role: String,
    pub joined_at: u64,
    pub stake_amount: String,
    pub is_active: bool,
    pub transaction_hash: String,
}

impl TeamMember {
    #[must_use]
    pub fn key(team: &str, member: &str) -> String {
        format!("{team}-{member}")
    }
}

impl_entity!(TeamMember, [
    ("id", FieldType::String),
    ("team", FieldType::Reference("Team")),
    ("member", FieldType::Reference("Superhero")),
    ("role", FieldType::String),
    ("joinedAt", FieldType::Int),
    ("stakeAmount", FieldType::BigInt),
    ("isActive", FieldType::Bool),
    ("transactionHash", FieldType::Hash),
]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub idea: String,
    pub buyer: String,
    pub seller: String,
    pub price: String,
    pub timestamp: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl_entity!(Purchase, [
    ("id", FieldType::String),
    ("idea", FieldType::Reference("Idea")),
    ("buyer", FieldType::Reference("Superhero")),
    ("seller", FieldType::Reference("Superhero")),
    ("price", FieldType::BigInt),
    ("timestamp", FieldType::Int),
    ("transactionHash", FieldType::Hash),
    ("blockNumber", FieldType::Int),
]);

/// One rater's score for one idea, keyed `"{idea}-{rater}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub idea: String,
    pub rater: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub timestamp: u64,
    pub transaction_hash: String,
}

impl Rating {
    #[must_use]
    pub fn key(idea: &str, rater: &str) -> String {
        format!("{idea}-{rater}")
    }
}

impl_entity!(Rating, [
    ("id", FieldType::String),
    ("idea", FieldType::Reference("Idea")),
    ("rater", FieldType::Reference("Superhero")),
    ("rating", FieldType::Int),
    ("comment", FieldType::String),
    ("timestamp", FieldType::Int),
    ("transactionHash", FieldType::Hash),
]);

/// Classification of an NFT transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Mint,
    Burn,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    pub contract: String,
    pub token_id: String,
    pub from: String,
    pub to: String,
    pub kind: TransferKind,
    pub timestamp: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl_entity!(Transfer, [
    ("id", FieldType::String),
    ("contract", FieldType::Address),
    ("tokenId", FieldType::BigInt),
    ("from", FieldType::Address),
    ("to", FieldType::Address),
    ("kind", FieldType::String),
    ("timestamp", FieldType::Int),
    ("transactionHash", FieldType::Hash),
    ("blockNumber", FieldType::Int),
]);

/// A stablecoin movement with a purpose tag derived from its counterparties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyTransaction {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub purpose: String,
    pub related_entity: Option<String>,
    pub timestamp: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl_entity!(CurrencyTransaction, [
    ("id", FieldType::String),
    ("from", FieldType::Address),
    ("to", FieldType::Address),
    ("amount", FieldType::BigInt),
    ("purpose", FieldType::String),
    ("relatedEntity", FieldType::String),
    ("timestamp", FieldType::Int),
    ("transactionHash", FieldType::Hash),
    ("blockNumber", FieldType::Int),
]);

/// Latest allowance per (owner, spender), keyed `"{owner}-{spender}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: String,
    pub owner: String,
    pub spender: String,
    pub amount: String,
    pub timestamp: u64,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl Approval {
    #[must_use]
    pub fn key(owner: &str, spender: &str) -> String {
        format!("{owner}-{spender}")
    }
}

impl_entity!(Approval, [
    ("id", FieldType::String),
    ("owner", FieldType::Address),
    ("spender", FieldType::Address),
    ("amount", FieldType::BigInt),
    ("timestamp", FieldType::Int),
    ("transactionHash", FieldType::Hash),
    ("blockNumber", FieldType::Int),
]);

/// Aggregated counters for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub id: String,
    pub total_superheroes: u64,
    pub total_ideas: u64,
    pub total_teams: u64,
    pub total_purchases: u64,
    pub total_ratings: u64,
    /// Sum of purchase prices in stablecoin smallest units.
    pub total_volume: String,
    pub updated_at: u64,
}

impl PlatformStats {
    pub const ALL_TIME: &'static str = "all_time";

    #[must_use]
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            total_superheroes: 0,
            total_ideas: 0,
            total_teams: 0,
            total_purchases: 0,
            total_ratings: 0,
            total_volume: "0".to_string(),
            updated_at: 0,
        }
    }
}

impl_entity!(PlatformStats, [
    ("id", FieldType::String),
    ("totalSuperheroes", FieldType::Int),
    ("totalIdeas", FieldType::Int),
    ("totalTeams", FieldType::Int),
    ("totalPurchases", FieldType::Int),
    ("totalRatings", FieldType::Int),
    ("totalVolume", FieldType::BigInt),
    ("updatedAt", FieldType::Int),
]);

/// Schemas of every kind this application writes.
#[must_use]
pub fn schemas() -> Vec<EntitySchema> {
    vec![
        Superhero::schema(),
        PendingRoles::schema(),
        Idea::schema(),
        Team::schema(),
        TeamMember::schema(),
        Purchase::schema(),
        Rating::schema(),
        Transfer::schema(),
        CurrencyTransaction::schema(),
        Approval::schema(),
        PlatformStats::schema(),
    ]
}
