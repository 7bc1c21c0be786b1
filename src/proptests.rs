use super::*;

use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

fn validate_array<T, I: TrieIndex>(a: &XArray<T, I>) {
    let bits = a.config.branching_bits;
    let root = a.blocks.get(a.root.0);
    assert!(root.parent.is_none(), "root must not have a parent");
    assert_eq!(root.shift, index::max_shift(I::BITS, bits));

    let mut stack = vec![a.root];
    let mut blocks = 0usize;
    let mut leaves = 0usize;
    while let Some(block_id) = stack.pop() {
        let block = a.blocks.get(block_id.0);
        assert_eq!(block.slots.len(), a.config.fanout());

        let occupied = block.slots.iter().filter(|s| **s != Slot::Empty).count();
        assert_eq!(block.used as usize, occupied, "used must match occupied slots");
        if block_id != a.root {
            blocks += 1;
            assert_ne!(block.used, 0, "empty non-root block survived");
        }

        for (pos, slot) in block.slots.iter().enumerate() {
            match *slot {
                Slot::Empty => {}
                Slot::Block(child_id) => {
                    assert_ne!(block.shift, 0, "block below shift 0");
                    let child = a.blocks.get(child_id.0);
                    assert_eq!(child.parent, Some(block_id));
                    assert_eq!(child.parent_pos as usize, pos);
                    assert_eq!(child.shift + bits, block.shift);
                    stack.push(child_id);
                }
                Slot::Leaf(leaf_id) => {
                    assert_eq!(block.shift, 0, "leaf above shift 0");
                    let leaf = a.leaves.get(leaf_id.0);
                    assert_eq!(leaf.block, block_id);
                    assert!(leaf.value.is_some(), "live leaf without a value");
                    assert_eq!(
                        a.locate(leaf.index).map(|(_, _, l)| l),
                        Some(leaf_id),
                        "leaf must be reachable through its own index"
                    );
                    leaves += 1;
                }
            }
        }
    }

    assert_eq!(blocks, a.block_count(), "reachable blocks must match block_count");
    assert_eq!(blocks + 1, a.blocks.live(), "pool live count must match trie");
    assert_eq!(leaves, a.len(), "reachable leaves must match len");
    assert_eq!(leaves, a.leaves.live());
}

#[derive(Clone, Debug)]
enum Op<I> {
    Set(I, u32),
    Unset(I),
    Get(I),
    Clear,
}

/// Indices clustered in a few regions so sets and unsets collide often.
fn index_strategy() -> impl Strategy<Value = u32> + Clone {
    prop_oneof![
        0u32..64,
        (0u32..64).prop_map(|i| i << 12),
        (0u32..64).prop_map(|i| u32::MAX - i),
        any::<u32>(),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op<u32>>> {
    let index = index_strategy();
    let op = prop_oneof![
        50 => (index.clone(), any::<u32>()).prop_map(|(i, v)| Op::Set(i, v)),
        30 => index.clone().prop_map(Op::Unset),
        19 => index.clone().prop_map(Op::Get),
        1 => Just(Op::Clear),
    ];
    prop::collection::vec(op, 0..=500)
}

fn ops_strategy_u64() -> impl Strategy<Value = Vec<Op<u64>>> {
    let index = prop_oneof![0u64..256, any::<u64>(), (0u64..16).prop_map(|i| u64::MAX - i)];
    let op = prop_oneof![
        50 => (index.clone(), any::<u32>()).prop_map(|(i, v)| Op::Set(i, v)),
        35 => index.clone().prop_map(Op::Unset),
        15 => index.clone().prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=300)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(
        ops in ops_strategy(),
        bits in 1u32..=8,
        pooling in any::<bool>(),
    ) {
        let config = Config::new().branching_bits(bits).pooling(pooling);
        let mut a: XArray<u32> = XArray::with_config(config).unwrap();
        let mut m: BTreeMap<u32, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Set(index, value) => {
                    prop_assert_eq!(*a.set(index, value).unwrap(), value);
                    m.insert(index, value);
                }
                Op::Unset(index) => {
                    prop_assert_eq!(a.unset(index), m.remove(&index).is_some());
                    prop_assert_eq!(a.get(index), None);
                }
                Op::Get(index) => {
                    prop_assert_eq!(a.get(index), m.get(&index));
                }
                Op::Clear => {
                    a.clear();
                    m.clear();
                    prop_assert_eq!(a.block_count(), 0);
                }
            }

            prop_assert_eq!(a.len(), m.len());
        }

        validate_array(&a);
        let got: Vec<(u32, u32)> = a.iter().map(|(i, v)| (i, *v)).collect();
        let expected: Vec<(u32, u32)> = m.iter().map(|(i, v)| (*i, *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_equivalence_u64(ops in ops_strategy_u64(), bits in 1u32..=8) {
        let mut a: XArray<u32, u64> =
            XArray::with_config(Config::new().branching_bits(bits)).unwrap();
        let mut m: BTreeMap<u64, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Set(index, value) => {
                    a.set(index, value).unwrap();
                    m.insert(index, value);
                }
                Op::Unset(index) => {
                    prop_assert_eq!(a.unset(index), m.remove(&index).is_some());
                }
                Op::Get(index) => {
                    prop_assert_eq!(a.get(index), m.get(&index));
                }
                Op::Clear => unreachable!(),
            }
        }

        validate_array(&a);
        let got: Vec<u64> = a.keys().collect();
        let expected: Vec<u64> = m.keys().copied().collect();
        prop_assert_eq!(got, expected);
    }

    /// Every payload that leaves the array goes through the callback exactly
    /// once, whichever path removes it.
    #[test]
    fn prop_destroy_exactly_once(ops in ops_strategy(), pooling in any::<bool>()) {
        let destroyed: Rc<RefCell<Vec<u32>>> = Rc::default();
        let sink = Rc::clone(&destroyed);
        let mut a: XArray<u32> = XArray::with_destructor(
            Config::new().pooling(pooling),
            move |v: &mut u32| sink.borrow_mut().push(*v),
        )
        .unwrap();

        let mut serial = 0u32;
        let mut stored: Vec<u32> = Vec::new();
        for op in ops {
            match op {
                Op::Set(index, _) => {
                    a.set(index, serial).unwrap();
                    stored.push(serial);
                    serial += 1;
                }
                Op::Unset(index) => {
                    a.unset(index);
                }
                Op::Get(_) => {}
                Op::Clear => a.clear(),
            }
        }

        let live: Vec<u32> = a.values().copied().collect();
        drop(a);

        let mut seen = destroyed.borrow().clone();
        seen.sort_unstable();
        prop_assert_eq!(&seen, &stored, "every stored payload destroyed once");
        for v in live {
            prop_assert!(seen.binary_search(&v).is_ok());
        }
    }

    #[test]
    fn prop_failed_set_leaves_trie_intact(
        ops in ops_strategy(),
        max_blocks in 0usize..12,
        max_leaves in 1usize..24,
    ) {
        let config = Config::new().max_blocks(max_blocks).max_leaves(max_leaves);
        let mut a: XArray<u32> = XArray::with_config(config).unwrap();
        let mut m: BTreeMap<u32, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Set(index, value) => {
                    let blocks = a.block_count();
                    match a.set(index, value) {
                        Ok(_) => {
                            m.insert(index, value);
                        }
                        Err(err) => {
                            prop_assert!(
                                matches!(err, Error::AllocationFailed { .. }),
                                "unexpected error {:?}",
                                err
                            );
                            prop_assert_eq!(a.block_count(), blocks);
                            prop_assert_eq!(a.get(index), m.get(&index));
                        }
                    }
                }
                Op::Unset(index) => {
                    a.unset(index);
                    m.remove(&index);
                }
                Op::Get(index) => {
                    prop_assert_eq!(a.get(index), m.get(&index));
                }
                Op::Clear => {
                    a.clear();
                    m.clear();
                }
            }
            prop_assert!(a.block_count() <= max_blocks);
            prop_assert!(a.len() <= max_leaves);
        }

        validate_array(&a);
        prop_assert_eq!(a.len(), m.len());
    }
}

#[test]
fn exhaustive_small_width() {
    // Every u16 index, every branching factor.
    for bits in 1..=8u32 {
        let mut a: XArray<u16, u16> =
            XArray::with_config(Config::new().branching_bits(bits).pooling(bits % 2 == 0)).unwrap();
        for i in (0..=u16::MAX).rev() {
            a.set(i, i).unwrap();
        }
        validate_array(&a);
        assert_eq!(a.len(), 1 << 16);
        assert!(a.iter().map(|(i, _)| i).eq(0..=u16::MAX));

        for i in (0..=u16::MAX).filter(|i| i % 3 != 0) {
            assert!(a.unset(i));
        }
        validate_array(&a);
        assert!(a.keys().eq((0..=u16::MAX).filter(|i| i % 3 == 0)));

        a.clear();
        validate_array(&a);
        assert!(a.is_empty());
    }
}

#[test]
fn exhaustive_remove_order_small_set() {
    let indices: [u32; 5] = [0, 1, 64, 4096, u32::MAX];
    let mut order: Vec<usize> = (0..indices.len()).collect();

    // Heap's algorithm over removal orders.
    fn permute(k: usize, order: &mut Vec<usize>, f: &mut impl FnMut(&[usize])) {
        if k == 1 {
            f(order.as_slice());
            return;
        }
        permute(k - 1, order, f);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                order.swap(i, k - 1);
            } else {
                order.swap(0, k - 1);
            }
            permute(k - 1, order, f);
        }
    }

    let n = order.len();
    permute(n, &mut order, &mut |perm| {
        let mut a: XArray<u32> = XArray::new();
        for &i in &indices {
            a.set(i, i).unwrap();
        }
        let mut remaining: Vec<u32> = indices.to_vec();
        for &p in perm {
            assert!(a.unset(indices[p]));
            remaining.retain(|&i| i != indices[p]);
            validate_array(&a);
            assert!(a.keys().eq(remaining.iter().copied()));
        }
        assert_eq!(a.block_count(), 0);
    });
}

#[test]
fn panicking_destructor_during_clear_keeps_array_usable() {
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let calls = Rc::new(Cell::new(0usize));
    let seen = Rc::clone(&calls);
    let mut a: XArray<u32> = XArray::with_destructor(Config::new().pooling(true), move |_| {
        seen.set(seen.get() + 1);
        if seen.get() == 2 {
            panic!("destroy callback failed");
        }
    })
    .unwrap();
    a.set(0, 0).unwrap();
    a.set(1 << 24, 1).unwrap();
    let pooled = a.stats();

    let result = catch_unwind(AssertUnwindSafe(|| a.clear()));
    assert!(result.is_err());
    assert_eq!(calls.get(), 2);

    validate_array(&a);
    assert_eq!(a.len(), 1);
    assert_eq!(a.get(0), None);
    assert_eq!(a.get(1 << 24), Some(&1));
    assert_eq!(a.iter().map(|(i, v)| (i, *v)).collect::<Vec<_>>(), vec![(1 << 24, 1)]);
    assert_eq!(a.stats().pooled_blocks, pooled.pooled_blocks);

    a.clear();
    assert_eq!(calls.get(), 3);
    validate_array(&a);
    assert!(a.is_empty());
    assert_eq!(a.block_count(), 0);

    a.set(7, 7).unwrap();
    drop(a);
    assert_eq!(calls.get(), 4);
}
