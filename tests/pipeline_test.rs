use alloy::primitives::{keccak256, Address, LogData, B256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use evm_indexer_sdk::testing::MockChain;
use evm_indexer_sdk::{
    format_address, ChainReader, ChangeSet, ContractConfig, Cursor, Decoded, Entity, EntityStore,
    EventDecoder, EventHandler, EventLog, HandlerContext, Indexer, IndexerConfigBuilder,
    IndexerState, ListRequest, MemoryStore, NetworkConfig, Progress, RawLog, RetryConfig, StoreTx,
};
use std::sync::Arc;
use std::time::Duration;
use superhero_indexer::enrichment::{encode_profile, ProfileData};
use superhero_indexer::entities::{
    CurrencyTransaction, Idea, PendingRoles, PlatformStats, Purchase, Superhero, Team, TeamMember,
    TeamStatus, Transfer, TransferKind,
};
use superhero_indexer::handlers::MarketplaceHandler;

sol! {
    event SuperheroCreated(address indexed superhero, uint256 indexed id, bytes32 name, uint256 timestamp);
    event RoleGranted(bytes32 indexed role, address indexed account, address indexed sender);
    event RoleRevoked(bytes32 indexed role, address indexed account, address indexed sender);
    event IdeaCreated(uint256 indexed ideaId, address indexed creator, bytes32 title, bytes32[] categories, string ipfsHash, uint256 price, uint256 timestamp);
    event IdeaRated(uint256 indexed ideaId, address indexed rater, uint8 rating, string comment);
    event IdeaListed(uint256 indexed ideaId, uint256 price);
    event IdeaPurchased(uint256 indexed ideaId, address indexed buyer, address indexed seller, uint256 price, uint256 timestamp);
    event TeamCreated(uint256 indexed teamId, address indexed leader, bytes32 name, string description, bytes32 projectName, uint256 requiredMembers, uint256 requiredStake, bytes32[] roles, bytes32[] tags, uint256 timestamp);
    event MemberJoined(uint256 indexed teamId, address indexed member, bytes32 role, uint256 stakeAmount, uint256 timestamp);
    event TeamStatusChanged(uint256 indexed teamId, uint8 status);
}

mod nft {
    alloy::sol! {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

mod erc20 {
    alloy::sol! {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
    }
}

const NFT: Address = Address::repeat_byte(0x01);
const REGISTRY: Address = Address::repeat_byte(0x02);
const MARKET: Address = Address::repeat_byte(0x03);
const TEAMS: Address = Address::repeat_byte(0x04);
const USDC: Address = Address::repeat_byte(0x05);

const HERO_A: Address = Address::repeat_byte(0xaa);
const HERO_B: Address = Address::repeat_byte(0xbb);
const HERO_C: Address = Address::repeat_byte(0xcc);

// ── helpers ───────────────────────────────────────────────────────────────────

fn contracts() -> Vec<ContractConfig> {
    let contract = |name: &str, address: Address, abi: &str| {
        ContractConfig::new(name, &address.to_string(), abi, 1).unwrap()
    };
    vec![
        contract("SuperheroNFT", NFT, include_str!("../abis/SuperheroNFT.json")),
        contract("IdeaRegistry", REGISTRY, include_str!("../abis/IdeaRegistry.json")),
        contract("Marketplace", MARKET, include_str!("../abis/Marketplace.json")),
        contract("TeamCore", TEAMS, include_str!("../abis/TeamCore.json")),
        contract("USDC", USDC, include_str!("../abis/USDC.json")).with_decimals(6),
    ]
}

fn build(chain: Arc<MockChain>, store: Arc<MemoryStore>) -> Indexer {
    let config = IndexerConfigBuilder::new()
        .with_rpc("http://127.0.0.1:8545")
        .with_network(NetworkConfig::new("superhero-test", 31337, contracts()))
        .with_batch_size(3)
        .with_poll_interval_ms(10)
        .with_reader_timeout_ms(200)
        .with_retry(RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            backoff_multiplier: 1.0,
            max_backoff_ms: 2,
            jitter: false,
        })
        .build()
        .unwrap();
    let mut indexer = Indexer::with_components(config, chain, store);
    superhero_indexer::register_handlers(&mut indexer).unwrap();
    indexer
}

async fn sync(indexer: &Indexer) {
    loop {
        if indexer.step().await.unwrap() == Progress::Idle {
            return;
        }
    }
}

async fn load<E: Entity>(store: &MemoryStore, id: &str) -> Option<E> {
    store
        .get(E::KIND, id)
        .await
        .unwrap()
        .map(|value| serde_json::from_value(value).unwrap())
}

fn word(text: &str) -> B256 {
    B256::right_padding_from(text.as_bytes())
}

fn addr(address: Address) -> String {
    format_address(&address)
}

fn superhero_created(who: Address, id: u64, name: &str) -> (Address, LogData) {
    let event = SuperheroCreated {
        superhero: who,
        id: U256::from(id),
        name: word(name),
        timestamp: U256::from(1_700_000_100u64),
    };
    (NFT, event.encode_log_data())
}

fn role_change(role: &str, account: Address, granted: bool) -> (Address, LogData) {
    let role = keccak256(role.as_bytes());
    let sender = Address::repeat_byte(0xad);
    let data = if granted {
        RoleGranted {
            role,
            account,
            sender,
        }
        .encode_log_data()
    } else {
        RoleRevoked {
            role,
            account,
            sender,
        }
        .encode_log_data()
    };
    (NFT, data)
}

fn idea_created(id: u64, creator: Address, price: u64) -> (Address, LogData) {
    let event = IdeaCreated {
        ideaId: U256::from(id),
        creator,
        title: word("Solar kites"),
        categories: vec![word("energy"), word("hardware")],
        ipfsHash: "QmIdeaContent".to_string(),
        price: U256::from(price),
        timestamp: U256::from(1_700_000_200u64),
    };
    (REGISTRY, event.encode_log_data())
}

fn idea_rated(id: u64, rater: Address, rating: u8) -> (Address, LogData) {
    let event = IdeaRated {
        ideaId: U256::from(id),
        rater,
        rating,
        comment: String::new(),
    };
    (REGISTRY, event.encode_log_data())
}

fn idea_purchased(id: u64, buyer: Address, seller: Address, price: u64) -> (Address, LogData) {
    let event = IdeaPurchased {
        ideaId: U256::from(id),
        buyer,
        seller,
        price: U256::from(price),
        timestamp: U256::from(1_700_000_300u64),
    };
    (MARKET, event.encode_log_data())
}

fn team_created(id: u64, leader: Address) -> (Address, LogData) {
    let event = TeamCreated {
        teamId: U256::from(id),
        leader,
        name: word("Avengers"),
        description: "Assemble".to_string(),
        projectName: word("Tower"),
        requiredMembers: U256::from(3u64),
        requiredStake: U256::from(100_000_000u64),
        roles: vec![word("engineer")],
        tags: vec![word("defi")],
        timestamp: U256::from(1_700_000_400u64),
    };
    (TEAMS, event.encode_log_data())
}

fn member_joined(id: u64, member: Address, role: &str) -> (Address, LogData) {
    let event = MemberJoined {
        teamId: U256::from(id),
        member,
        role: word(role),
        stakeAmount: U256::from(100_000_000u64),
        timestamp: U256::from(1_700_000_500u64),
    };
    (TEAMS, event.encode_log_data())
}

fn nft_transfer(from: Address, to: Address, token: u64) -> (Address, LogData) {
    let event = nft::Transfer {
        from,
        to,
        tokenId: U256::from(token),
    };
    (NFT, event.encode_log_data())
}

fn usdc_transfer(from: Address, to: Address, value: u64) -> (Address, LogData) {
    let event = erc20::Transfer {
        from,
        to,
        value: U256::from(value),
    };
    (USDC, event.encode_log_data())
}

// ── scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_superhero_with_failed_enrichment_is_degraded() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    chain.mine(vec![superhero_created(HERO_A, 1, "Nova")]);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let hero: Superhero = load(&store, &addr(HERO_A)).await.unwrap();
    assert_eq!(hero.name, "Nova");
    assert_eq!(hero.reputation, 0);
    assert!(hero.skills.is_empty());
    assert_eq!(hero.superhero_id, "1");

    let stats: PlatformStats = load(&store, PlatformStats::ALL_TIME).await.unwrap();
    assert_eq!(stats.total_superheroes, 1);
}

#[tokio::test]
async fn test_superhero_with_profile_read_is_enriched() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    let profile = ProfileData {
        superhero_id: "1".into(),
        name: "Nova".into(),
        bio: "Builds solar kites".into(),
        avatar_url: Some("ipfs://avatar".into()),
        reputation: 87,
        skills: vec!["rust".into(), "solidity".into()],
        specialities: vec!["energy".into()],
        flagged: false,
        created_at: 1_700_000_100,
    };
    chain.set_call_response(NFT, encode_profile(&profile).into());
    chain.mine(vec![superhero_created(HERO_A, 1, "Nova")]);

    let indexer = build(chain.clone(), store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let hero: Superhero = load(&store, &addr(HERO_A)).await.unwrap();
    assert_eq!(hero.reputation, 87);
    assert_eq!(hero.skills, vec!["rust", "solidity"]);
    assert_eq!(hero.avatar_url.as_deref(), Some("ipfs://avatar"));
    assert_eq!(chain.call_count(), 1);
}

#[tokio::test]
async fn test_role_changes_update_existing_profile() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    chain.mine(vec![superhero_created(HERO_A, 1, "Nova")]);
    chain.mine(vec![
        role_change("MINTER_ROLE", HERO_A, true),
        role_change("MINTER_ROLE", HERO_A, true),
        role_change("PAUSER_ROLE", HERO_A, true),
    ]);
    chain.mine(vec![
        role_change("MINTER_ROLE", HERO_A, false),
        role_change("MODERATOR_ROLE", HERO_A, false),
    ]);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let hero: Superhero = load(&store, &addr(HERO_A)).await.unwrap();
    assert_eq!(hero.roles, vec!["PAUSER_ROLE"]);
    assert_eq!(store.count(Superhero::KIND), 1);
    assert_eq!(store.count(EventLog::KIND), 6);
}

#[tokio::test]
async fn test_roles_granted_before_profile_are_applied_on_creation() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    // Minting grants the role before announcing the new profile.
    chain.mine(vec![
        role_change("SUPERHERO_ROLE", HERO_B, true),
        role_change("MINTER_ROLE", HERO_B, true),
        role_change("MINTER_ROLE", HERO_B, false),
        superhero_created(HERO_B, 2, "Flux"),
    ]);
    chain.mine(vec![role_change("MODERATOR_ROLE", HERO_C, true)]);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let hero: Superhero = load(&store, &addr(HERO_B)).await.unwrap();
    assert_eq!(hero.roles, vec!["SUPERHERO_ROLE"]);
    let staged: PendingRoles = load(&store, &addr(HERO_B)).await.unwrap();
    assert!(staged.roles.is_empty());

    // No profile is invented for a bare role holder.
    assert!(load::<Superhero>(&store, &addr(HERO_C)).await.is_none());
    let staged: PendingRoles = load(&store, &addr(HERO_C)).await.unwrap();
    assert_eq!(staged.roles, vec!["MODERATOR_ROLE"]);
    let stats: PlatformStats = load(&store, PlatformStats::ALL_TIME).await.unwrap();
    assert_eq!(stats.total_superheroes, 1);
}

#[tokio::test]
async fn test_idea_purchase_flips_flag_once() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    chain.mine(vec![idea_created(42, HERO_A, 500_000_000)]);
    chain.mine(vec![
        usdc_transfer(HERO_B, MARKET, 500_000_000),
        idea_purchased(42, HERO_B, HERO_A, 500_000_000),
    ]);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let idea: Idea = load(&store, "42").await.unwrap();
    assert!(idea.is_purchased);
    assert_eq!(idea.price, "500000000");
    assert_eq!(idea.creator, addr(HERO_A));
    assert_eq!(idea.categories, vec!["energy", "hardware"]);

    let purchases = indexer
        .query_surface()
        .list("Purchase", ListRequest::default().filter("idea", "42"))
        .await
        .unwrap();
    assert_eq!(purchases.items.len(), 1);
    assert_eq!(purchases.items[0]["buyer"], addr(HERO_B));

    let payments = indexer
        .query_surface()
        .list(
            "CurrencyTransaction",
            ListRequest::default().filter("purpose", "marketplace_payment"),
        )
        .await
        .unwrap();
    assert_eq!(payments.items.len(), 1);
    let payment: CurrencyTransaction = serde_json::from_value(payments.items[0].clone()).unwrap();
    assert_eq!(payment.amount, "500000000");

    let stats: PlatformStats = load(&store, PlatformStats::ALL_TIME).await.unwrap();
    assert_eq!(stats.total_purchases, 1);
    assert_eq!(stats.total_volume, "500000000");
}

#[tokio::test]
async fn test_team_creation_seeds_leader_membership() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    chain.mine(vec![team_created(7, HERO_B)]);
    chain.mine(vec![
        member_joined(7, HERO_C, ""),
        member_joined(7, HERO_C, "engineer"),
    ]);
    chain.mine(vec![{
        let event = TeamStatusChanged {
            teamId: U256::from(7u64),
            status: 1,
        };
        (TEAMS, event.encode_log_data())
    }]);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let team: Team = load(&store, "7").await.unwrap();
    assert_eq!(team.current_members, 2);
    assert_eq!(team.status, TeamStatus::Completed);
    assert_eq!(team.required_stake, "100000000");

    let leader: TeamMember = load(&store, &format!("7-{}", addr(HERO_B))).await.unwrap();
    assert_eq!(leader.role, "leader");
    assert!(leader.is_active);

    // The second join for the same member is rejected; the first one stands.
    let member: TeamMember = load(&store, &TeamMember::key("7", &addr(HERO_C))).await.unwrap();
    assert_eq!(member.role, "member");
}

#[tokio::test]
async fn test_transfers_are_classified() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    chain.mine(vec![
        nft_transfer(Address::ZERO, HERO_A, 1),
        nft_transfer(HERO_A, Address::ZERO, 1),
    ]);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let page = indexer
        .query_surface()
        .list("Transfer", ListRequest::default())
        .await
        .unwrap();
    let mut kinds: Vec<TransferKind> = page
        .items
        .into_iter()
        .map(|value| serde_json::from_value::<Transfer>(value).unwrap().kind)
        .collect();
    kinds.sort_by_key(|kind| format!("{kind:?}"));
    assert_eq!(kinds, vec![TransferKind::Burn, TransferKind::Mint]);
    assert_eq!(store.count(Transfer::KIND), 2);
}

#[tokio::test]
async fn test_reorg_rolls_back_only_replaced_blocks() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    chain.mine_empty_until(99);
    chain.mine(vec![superhero_created(HERO_A, 1, "Nova")]); // 100
    chain.mine(vec![idea_created(1, HERO_A, 1_000_000)]); // 101
    chain.mine(vec![idea_rated(1, HERO_B, 4)]); // 102
    chain.mine(vec![idea_created(2, HERO_A, 2_000_000)]); // 103
    chain.mine(vec![idea_purchased(1, HERO_B, HERO_A, 1_000_000)]); // 104
    chain.mine(vec![team_created(7, HERO_A)]); // 105

    let indexer = build(chain.clone(), store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    let idea: Idea = load(&store, "1").await.unwrap();
    assert!(idea.is_purchased);
    assert!(load::<Team>(&store, "7").await.is_some());
    let before_hero: Superhero = load(&store, &addr(HERO_A)).await.unwrap();

    chain.reorg(103);
    chain.mine(vec![idea_created(3, HERO_B, 3_000_000)]); // 103'
    chain.mine(vec![idea_rated(1, HERO_C, 2)]); // 104'
    chain.mine(Vec::new()); // 105'

    sync(&indexer).await;
    assert_eq!(indexer.state(), IndexerState::Live);

    // Blocks 100..=102 untouched.
    assert_eq!(load::<Superhero>(&store, &addr(HERO_A)).await.unwrap(), before_hero);
    let idea: Idea = load(&store, "1").await.unwrap();
    assert!(!idea.is_purchased);
    assert_eq!(idea.rating_total, 6);
    assert_eq!(idea.num_raters, 2);

    // Blocks 103..=105 replaced.
    assert!(load::<Idea>(&store, "2").await.is_none());
    assert!(load::<Idea>(&store, "3").await.is_some());
    assert!(load::<Team>(&store, "7").await.is_none());
    assert_eq!(store.count(Purchase::KIND), 0);

    let stats: PlatformStats = load(&store, PlatformStats::ALL_TIME).await.unwrap();
    assert_eq!(stats.total_ideas, 2);
    assert_eq!(stats.total_ratings, 2);
    assert_eq!(stats.total_purchases, 0);
    assert_eq!(stats.total_teams, 0);

    let cursor = store.load_cursor("superhero-test").await.unwrap().unwrap();
    assert_eq!(cursor.block_number, 105);
    assert_eq!(Some(cursor.block_hash), chain.hash_of(105));
}

// ── properties ────────────────────────────────────────────────────────────────

fn mine_marketplace_history(chain: &MockChain) {
    chain.mine(vec![
        superhero_created(HERO_A, 1, "Nova"),
        superhero_created(HERO_B, 2, "Bolt"),
    ]);
    chain.mine(vec![idea_created(1, HERO_A, 5_000_000), idea_created(2, HERO_B, 7_000_000)]);
    chain.mine(vec![idea_rated(1, HERO_B, 5), idea_rated(1, HERO_C, 3)]);
    chain.mine(vec![idea_rated(1, HERO_B, 1), idea_rated(2, HERO_A, 9)]);
    chain.mine(vec![
        usdc_transfer(HERO_B, MARKET, 5_000_000),
        idea_purchased(1, HERO_B, HERO_A, 5_000_000),
    ]);
    chain.mine(vec![team_created(9, HERO_A), member_joined(9, HERO_B, "designer")]);
    chain.mine(vec![{
        let event = erc20::Approval {
            owner: HERO_A,
            spender: MARKET,
            value: U256::from(10u64),
        };
        (USDC, event.encode_log_data())
    }]);
}

#[tokio::test]
async fn test_replay_from_fresh_store_is_identical() {
    let chain = Arc::new(MockChain::new(31337));
    mine_marketplace_history(&chain);

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(MemoryStore::new());
        let indexer = build(chain.clone(), store.clone());
        indexer.prepare().await.unwrap();
        sync(&indexer).await;
        snapshots.push(store.snapshot());
    }
    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(snapshots[0]["Idea"].len(), 2);
}

#[tokio::test]
async fn test_rating_counters_stay_consistent() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    mine_marketplace_history(&chain);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();

    let mut last = std::collections::HashMap::<String, (u64, u64)>::new();
    loop {
        let progress = indexer.step().await.unwrap();
        for value in store.snapshot().get("Idea").into_iter().flat_map(|t| t.values()) {
            let idea: Idea = serde_json::from_value(value.clone()).unwrap();
            if idea.num_raters == 0 {
                assert_eq!(idea.rating_total, 0);
            }
            let (total, raters) = last.get(&idea.id).copied().unwrap_or((0, 0));
            assert!(idea.rating_total >= total && idea.num_raters >= raters);
            last.insert(idea.id.clone(), (idea.rating_total, idea.num_raters));
        }
        if progress == Progress::Idle {
            break;
        }
    }

    // The repeat rating by HERO_B and the out-of-range score were rejected.
    assert_eq!(last["1"], (8, 2));
    assert_eq!(last["2"], (0, 0));
}

#[tokio::test]
async fn test_unhandled_events_leave_state_alone() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    chain.mine(vec![{
        let event = IdeaListed {
            ideaId: U256::from(1u64),
            price: U256::from(10u64),
        };
        (REGISTRY, event.encode_log_data())
    }]);
    chain.mine(vec![(
        Address::repeat_byte(0x99),
        idea_created(5, HERO_A, 1).1,
    )]);

    let indexer = build(chain, store.clone());
    indexer.prepare().await.unwrap();
    sync(&indexer).await;

    assert_eq!(store.count(Idea::KIND), 0);
    assert_eq!(store.count(EventLog::KIND), 0);
    assert_eq!(indexer.handler_registry().metrics().dispatch_misses(), 1);
    let cursor = store.load_cursor("superhero-test").await.unwrap().unwrap();
    assert_eq!(cursor.block_number, 2);
}

#[tokio::test]
async fn test_duplicate_purchase_delivery_is_harmless() {
    let chain = Arc::new(MockChain::new(31337));
    let store = Arc::new(MemoryStore::new());
    let contracts = contracts();
    let decoder = EventDecoder::new(&contracts);
    let reader = ChainReader::new(chain.clone(), &contracts, Duration::from_millis(200));

    store.put_raw(
        Idea::KIND,
        "42",
        serde_json::json!({
            "id": "42", "creator": addr(HERO_A), "title": "Solar kites", "categories": [],
            "ipfsHash": "Qm", "price": "500000000", "ratingTotal": 0, "numRaters": 0,
            "isPurchased": false, "createdAt": 0, "transactionHash": "0x00", "blockNumber": 1
        }),
    );

    let (address, data) = idea_purchased(42, HERO_B, HERO_A, 500_000_000);
    let (topics, data) = data.split();
    let log = RawLog {
        address,
        topics,
        data,
        block_number: 3,
        block_hash: B256::repeat_byte(0x33),
        block_timestamp: Some(1_700_000_036),
        transaction_hash: B256::repeat_byte(0x44),
        log_index: 0,
        removed: false,
    };
    let Decoded::Event(event) = decoder.decode(&log) else {
        panic!("purchase log did not decode");
    };

    let handler = MarketplaceHandler;
    for _ in 0..2 {
        let mut tx = StoreTx::new(store.clone());
        let mut ctx = HandlerContext {
            store: &mut tx,
            reader: &reader,
        };
        handler.handle(&event, &mut ctx).await.unwrap();
        store
            .commit(ChangeSet {
                source: "superhero-test".into(),
                block_number: 3,
                writes: tx.into_writes(),
                cursor: Cursor::at_log(3, 0, log.block_hash),
                block_hashes: vec![(3, log.block_hash)],
            })
            .await
            .unwrap();
    }

    let idea: Idea = load(&store, "42").await.unwrap();
    assert!(idea.is_purchased);
    assert_eq!(store.count(Purchase::KIND), 1);
    let stats: PlatformStats = load(&store, PlatformStats::ALL_TIME).await.unwrap();
    assert_eq!(stats.total_purchases, 1);
}
