use benchmark_simple::*;
use digest_engine::prelude::*;

fn main() {
    let bench = Bench::new();

    let options = &Options {
        iterations: 10000,
        warmup_iterations: 1000,
        min_samples: 5,
        max_samples: 10,
        max_rsd: 1.0,
        ..Default::default()
    };

    let engine = DigestEngine::new();
    let data = vec![0x5au8; 4096];

    for algorithm in [AlgorithmId::Sha256, AlgorithmId::Sha512, AlgorithmId::Blake2b256].iter() {
        let res = bench.run(options, || engine.digest(*algorithm, &data).unwrap());
        println!("{} - 4 KiB: {}", algorithm, res.throughput(data.len() as _));
    }

    let key = KeyMaterial::generate(32);
    let res = bench.run(options, || {
        engine
            .hmac(AlgorithmId::HmacSha256, &key, &DirectKeys, &data)
            .unwrap()
    });
    println!("HMAC-SHA256 - 4 KiB: {}", res.throughput(data.len() as _));

    let store = MemoryKeyStore::new();
    let key_handle = store.insert(&[7u8; 32]);
    let registry = ContextRegistry::with_engine(DigestEngine::new(), store);
    let res = bench.run(options, || {
        let handle = registry
            .open_hmac(AlgorithmId::HmacSha256, key_handle)
            .unwrap();
        registry.update(handle, &data, 0, 64).unwrap();
        registry.finalize(handle, 32).unwrap()
    });
    println!("registry open/update/finalize: {}", res.throughput(1));
}
