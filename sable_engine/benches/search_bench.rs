
use criterion::{criterion_group, criterion_main, Criterion};

use sable_engine_lib::board::Pos;
use sable_engine_lib::explore::Explorer;
use sable_engine_lib::options::EngineConfig;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_search(c: &mut Criterion) {
    let pos = Pos::from_fen(KIWIPETE).unwrap();
    let cfg = EngineConfig { hash_mb: 16, ..EngineConfig::default() };

    c.bench_function("search kiwipete depth 4", |b| {
        b.iter(|| {
            let mut ex = Explorer::new(cfg.clone());
            ex.search_position_depth(&pos, 4, None, None)
        })
    });

    c.bench_function("search startpos depth 5", |b| {
        let start = Pos::startpos();
        b.iter(|| {
            let mut ex = Explorer::new(cfg.clone());
            ex.search_position_depth(&start, 5, None, None)
        })
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
