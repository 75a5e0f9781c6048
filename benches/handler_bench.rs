use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use evm_indexer_sdk::testing::MockChain;
use evm_indexer_sdk::{
    ContractConfig, Indexer, IndexerConfigBuilder, MemoryStore, NetworkConfig, Progress,
};
use std::sync::Arc;

sol! {
    event IdeaCreated(uint256 indexed ideaId, address indexed creator, bytes32 title, bytes32[] categories, string ipfsHash, uint256 price, uint256 timestamp);
    event IdeaRated(uint256 indexed ideaId, address indexed rater, uint8 rating, string comment);
}

const REGISTRY: Address = Address::repeat_byte(0x02);
const BLOCKS: u64 = 50;
const IDEAS_PER_BLOCK: u64 = 20;

fn chain() -> Arc<MockChain> {
    let chain = Arc::new(MockChain::new(31337));
    for block in 0..BLOCKS {
        let logs = (0..IDEAS_PER_BLOCK)
            .flat_map(|i| {
                let id = U256::from(block * IDEAS_PER_BLOCK + i);
                let created = IdeaCreated {
                    ideaId: id,
                    creator: Address::repeat_byte(0xaa),
                    title: B256::right_padding_from(b"bench"),
                    categories: vec![B256::right_padding_from(b"defi")],
                    ipfsHash: "QmBench".to_string(),
                    price: U256::from(1_000_000u64),
                    timestamp: U256::from(1_700_000_000u64),
                };
                let rated = IdeaRated {
                    ideaId: id,
                    rater: Address::repeat_byte(0xbb),
                    rating: 4,
                    comment: String::new(),
                };
                [
                    (REGISTRY, created.encode_log_data()),
                    (REGISTRY, rated.encode_log_data()),
                ]
            })
            .collect();
        chain.mine(logs);
    }
    chain
}

fn indexer(chain: Arc<MockChain>) -> Indexer {
    let abi = include_str!("../abis/IdeaRegistry.json");
    let contract = ContractConfig::new("IdeaRegistry", &REGISTRY.to_string(), abi, 1).unwrap();
    let config = IndexerConfigBuilder::new()
        .with_rpc("http://127.0.0.1:8545")
        .with_network(NetworkConfig::new("bench", 31337, vec![contract]))
        .with_batch_size(10)
        .build()
        .unwrap();
    let mut indexer = Indexer::with_components(config, chain, Arc::new(MemoryStore::new()));
    superhero_indexer::register_handlers(&mut indexer).unwrap();
    indexer
}

fn bench_pipeline(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let chain = chain();

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("ideas_and_ratings_50_blocks", |b| {
        b.to_async(&runtime).iter_batched(
            || indexer(chain.clone()),
            |indexer| async move {
                indexer.prepare().await.unwrap();
                while indexer.step().await.unwrap() != Progress::Idle {}
            },
            BatchSize::PerIteration,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
