use std::error::Error;
use std::time::Instant;
use tiered_buckets::{HashTable, TableConfig, TableStats};

fn main() -> Result<(), Box<dyn Error>> {

    const CAPACITY: usize = 50000;
    const SAMPLE_SIZE: usize = 200000;
    const HOT_KEYS: usize = 64;

    let samples: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rand::random::<u64>()).collect();

    let config: TableConfig = TableConfig::builder()
        .initial_capacity(CAPACITY)
        .dimensions(3)
        .build();
    let mut h: HashTable<u64, u64> = HashTable::with_config(config)?;

    let now: Instant = Instant::now();
    for key in samples.iter() {
        h.put(*key, *key);
    }
    let elapsed: usize = now.elapsed().as_nanos() as usize;

    println!("Initial capacity {} actual capacity {}", CAPACITY, h.capacity());
    println!("Initial entries {} actual entries {}", SAMPLE_SIZE, h.size());
    println!("Load factor {}", h.load_factor());
    println!("Avg time to insert {}", elapsed as f64 / SAMPLE_SIZE as f64);

    let now: Instant = Instant::now();
    for key in samples.iter() {
        if h.get(key).is_none() {
            return Err(format!("Failed to get key {}", key).into());
        }
    }
    let elapsed: usize = now.elapsed().as_nanos() as usize;
    println!("Avg time to lookup {}", elapsed as f64 / SAMPLE_SIZE as f64);

    // skewed workload: a few keys get most of the traffic and end up in the fast regions
    benchmarking::warm_up();
    let hot: Vec<u64> = samples[..HOT_KEYS].to_vec();
    let bench_result = benchmarking::measure_function(|measurer| {
        for (i, key) in samples.iter().enumerate().take(SAMPLE_SIZE / 10) {
            let key: u64 = if i % 4 == 0 { *key } else { hot[i % HOT_KEYS] };
            measurer.measure(|| h.get(&key).copied());
        }
    })
    .map_err(|e| format!("{:?}", e))?;
    println!("Avg time to lookup (skewed) {:?}", bench_result.elapsed());

    let stats: TableStats = h.stats();
    println!(
        "Regions fast {} core {} overflow {} promotions {} resizes {}",
        stats.fast_entries, stats.core_entries, stats.overflow_entries, stats.promotions, stats.resizes
    );
    println!("Hot keys {} indexed keys {}", stats.hot_keys, stats.indexed_keys);

    let now: Instant = Instant::now();
    for key in samples.iter() {
        h.remove(key);
    }
    let elapsed: usize = now.elapsed().as_nanos() as usize;

    println!("Initial capacity {} actual capacity {}", CAPACITY, h.capacity());
    println!("Initial entries {} actual entries {}", SAMPLE_SIZE, h.size());
    println!("Avg time to delete {}", elapsed as f64 / SAMPLE_SIZE as f64);

    Ok(())
}
