use proptest::prelude::*;
use std::collections::HashMap;
use tiered_buckets::{HashTable, PromotionParams, TableConfig};

#[derive(Debug, Clone)]
enum Op {
    Put(u16, u32),
    Get(u16),
    Remove(u16),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        4 => (0u16..300, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        3 => (0u16..300).prop_map(Op::Get),
        2 => (0u16..300).prop_map(Op::Remove),
    ];
    prop::collection::vec(op, 0..600)
}

fn build_table(dimensions: usize, probe_budget: usize, minor: u64, major: u64) -> HashTable<u16, u32> {
    let promotion: PromotionParams = PromotionParams {
        threshold: 3,
        ops_threshold_minor: minor,
        ops_threshold_major: major,
        ..PromotionParams::default()
    };
    HashTable::with_config(
        TableConfig::builder()
            .initial_capacity(8)
            .dimensions(dimensions)
            .probe_budget(probe_budget)
            .promotion(promotion)
            .build(),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn table_matches_model(
        ops in ops(),
        dimensions in 1usize..4,
        probe_budget in 1usize..8,
        minor in 1u64..40,
        major in 1u64..200,
    ) {
        let mut table: HashTable<u16, u32> = build_table(dimensions, probe_budget, minor, major);
        let mut model: HashMap<u16, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    prop_assert_eq!(table.put(k, v), model.insert(k, v));
                }
                Op::Get(k) => {
                    prop_assert_eq!(table.get(&k), model.get(&k));
                }
                Op::Remove(k) => {
                    prop_assert_eq!(table.remove(&k), model.remove(&k).is_some());
                }
            }
            prop_assert_eq!(table.size(), model.len());
        }

        let stats = table.stats();
        prop_assert_eq!(
            stats.fast_entries + stats.core_entries + stats.overflow_entries,
            model.len()
        );
        for (k, v) in model.iter() {
            prop_assert_eq!(table.peek(k), Some(v));
        }
        prop_assert_eq!(table.iter().count(), model.len());
    }

    #[test]
    fn resize_keeps_last_values(keys in prop::collection::vec(any::<u64>(), 1..400)) {
        let mut table: HashTable<u64, usize> = HashTable::with_capacity(4, 2).unwrap();
        let mut model: HashMap<u64, usize> = HashMap::new();
        for (i, k) in keys.iter().enumerate() {
            table.put(*k, i);
            model.insert(*k, i);
        }
        table.resize(table.capacity() * 3);
        prop_assert_eq!(table.size(), model.len());
        for (k, v) in model.iter() {
            prop_assert_eq!(table.get(k), Some(v));
        }
    }
}
