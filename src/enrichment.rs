//! Superhero profile enrichment.
//!
//! The `SuperheroCreated` log only carries the address, id and name. The rest
//! of the profile is read from `SuperheroNFT.getSuperheroProfile` at the
//! event's block. A failed or timed-out read never fails the handler: the
//! caller gets [`Enrichment::Partial`] and persists a degraded record.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, B256, U256};
use evm_indexer_sdk::{
    u256_to_u64, value_as_bool, value_as_string, value_as_string_list, value_as_uint,
    ChainReader, IndexerError, Result, TtlCache,
};
use std::time::Duration;
use tracing::{debug, warn};

pub const PROFILE_CONTRACT: &str = "SuperheroNFT";
pub const PROFILE_METHOD: &str = "getSuperheroProfile";

const PROFILE_FIELDS: usize = 9;

/// Profile attributes only available through a contract read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileData {
    pub superhero_id: String,
    pub name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub reputation: u64,
    pub skills: Vec<String>,
    pub specialities: Vec<String>,
    pub flagged: bool,
    pub created_at: u64,
}

/// Outcome of an enrichment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    Full(ProfileData),
    /// The read failed; only log-derived fields are trustworthy.
    Partial { reason: String },
}

/// Reads profiles through the chain reader, memoized per address.
///
/// Entries expire after the configured time-to-live. The owning handler
/// clears the cache on rollback and on halt.
pub struct ProfileEnricher {
    cache: TtlCache<Address, ProfileData>,
}

impl Default for ProfileEnricher {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), 10_000)
    }
}

impl ProfileEnricher {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            cache: TtlCache::new(ttl, capacity),
        }
    }

    pub async fn fetch(&self, reader: &ChainReader, superhero: Address, block: u64) -> Enrichment {
        if let Some(profile) = self.cache.get(&superhero) {
            debug!(%superhero, "Profile served from cache");
            return Enrichment::Full(profile);
        }

        let result = reader
            .call(
                PROFILE_CONTRACT,
                PROFILE_METHOD,
                &[DynSolValue::Address(superhero)],
                block,
            )
            .await
            .and_then(parse_profile);

        match result {
            Ok(profile) => {
                self.cache.insert(superhero, profile.clone());
                Enrichment::Full(profile)
            }
            Err(e) => {
                warn!(%superhero, block, error = %e, "Profile read failed; storing partial record");
                Enrichment::Partial {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

fn malformed(field: &str) -> IndexerError {
    IndexerError::DecodingError(format!("{PROFILE_METHOD} returned a malformed '{field}'"))
}

/// Accepts the profile either as one struct output or as flat outputs.
fn parse_profile(values: Vec<DynSolValue>) -> Result<ProfileData> {
    let fields = match <[DynSolValue; 1]>::try_from(values) {
        Ok([DynSolValue::Tuple(fields)]) => fields,
        Ok([other]) => vec![other],
        Err(values) => values,
    };
    if fields.len() != PROFILE_FIELDS {
        return Err(IndexerError::DecodingError(format!(
            "{PROFILE_METHOD} returned {} fields, expected {PROFILE_FIELDS}",
            fields.len()
        )));
    }

    let uint = |index: usize, name: &str| value_as_uint(&fields[index]).ok_or_else(|| malformed(name));
    let text = |index: usize, name: &str| value_as_string(&fields[index]).ok_or_else(|| malformed(name));
    let list =
        |index: usize, name: &str| value_as_string_list(&fields[index]).ok_or_else(|| malformed(name));

    let avatar_url = text(3, "avatarUrl")?;
    Ok(ProfileData {
        superhero_id: uint(0, "superheroId")?.to_string(),
        name: text(1, "name")?,
        bio: text(2, "bio")?,
        avatar_url: (!avatar_url.is_empty()).then_some(avatar_url),
        reputation: u256_to_u64(uint(4, "reputation")?, "reputation")?,
        skills: list(5, "skills")?,
        specialities: list(6, "specialities")?,
        flagged: value_as_bool(&fields[7]).ok_or_else(|| malformed("flagged"))?,
        created_at: u256_to_u64(uint(8, "createdAt")?, "createdAt")?,
    })
}

/// ABI encoding of a profile as `getSuperheroProfile` returns it.
///
/// Used by tests and benchmarks to script the chain's answer.
#[must_use]
pub fn encode_profile(profile: &ProfileData) -> Vec<u8> {
    let word = |text: &str| {
        let bytes = text.as_bytes();
        DynSolValue::FixedBytes(B256::right_padding_from(&bytes[..bytes.len().min(32)]), 32)
    };
    let words = |items: &[String]| DynSolValue::Array(items.iter().map(|s| word(s)).collect());
    let superhero_id = profile.superhero_id.parse::<U256>().unwrap_or_default();

    DynSolValue::Tuple(vec![DynSolValue::Tuple(vec![
        DynSolValue::Uint(superhero_id, 256),
        word(&profile.name),
        DynSolValue::String(profile.bio.clone()),
        DynSolValue::String(profile.avatar_url.clone().unwrap_or_default()),
        DynSolValue::Uint(U256::from(profile.reputation), 256),
        words(&profile.skills),
        words(&profile.specialities),
        DynSolValue::Bool(profile.flagged),
        DynSolValue::Uint(U256::from(profile.created_at), 256),
    ])])
    .abi_encode_params()
}
