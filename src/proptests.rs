use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::Trie;

/// Actions to test against both the trie and the model.
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(KeyValue),
    Update(KeyDelta),
    Get(Key),
    Erase(Key),
}

/// Wrapper for key generation with a custom strategy.
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

#[derive(Debug, Clone)]
struct KeyValue {
    key: Key,
    value: i32,
}

#[derive(Debug, Clone)]
struct KeyDelta {
    key: Key,
    delta: i32,
}

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        // Keys stay NUL-free: the terminator label is part of the encoding,
        // so `k` and `k` plus a trailing NUL cannot coexist in one trie.
        prop_oneof![
            // Empty key
            Just(Key(vec![])),
            // Short arbitrary bytes
            prop::collection::vec(1u8..=255, 1..4).prop_map(Key),
            // Dense two-letter alphabet: maximal prefix sharing and slot
            // contention, which is what drives the conflict resolver
            prop::collection::vec(97u8..=98, 1..8).prop_map(Key),
            // Word-shaped keys
            "[a-z]{1,6}".prop_map(|s| Key(s.into_bytes())),
        ]
        .boxed()
    }
}

impl Arbitrary for KeyValue {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Key>(), 0..1_000_000i32)
            .prop_map(|(key, value)| KeyValue { key, value })
            .boxed()
    }
}

impl Arbitrary for KeyDelta {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Key>(), 1..100i32)
            .prop_map(|(key, delta)| KeyDelta { key, delta })
            .boxed()
    }
}

/// Harness executing actions against a trie and a `BTreeMap` in lockstep.
struct Test {
    trie: Trie,
    model: BTreeMap<Vec<u8>, i32>,
}

impl Test {
    fn new(reduced: bool) -> Self {
        Test {
            trie: if reduced { Trie::reduced() } else { Trie::new() },
            model: BTreeMap::new(),
        }
    }

    fn execute(&mut self, action: &Action) {
        match action {
            Action::Insert(kv) => {
                self.trie.insert(&kv.key.0, kv.value).unwrap();
                self.model.insert(kv.key.0.clone(), kv.value);
            }
            Action::Update(kd) => {
                self.trie.update(&kd.key.0, kd.delta);
                *self.model.entry(kd.key.0.clone()).or_insert(0) += kd.delta;
            }
            Action::Get(key) => {
                assert_eq!(
                    self.trie.get(&key.0).ok(),
                    self.model.get(&key.0).copied(),
                    "get mismatch for key {:?}",
                    key.0
                );
            }
            Action::Erase(key) => {
                let trie_hit = self.trie.erase(&key.0).is_ok();
                let model_hit = self.model.remove(&key.0).is_some();
                assert_eq!(trie_hit, model_hit, "erase mismatch for key {:?}", key.0);
            }
        }
        self.trie.check_invariants();
    }

    /// Full predictive enumeration must replay the model in key order.
    fn check_enumeration(&self) {
        let got: Vec<i32> = self
            .trie
            .prefix_predict(b"")
            .map(|id| self.trie.value(id).unwrap())
            .collect();
        let want: Vec<i32> = self.model.values().copied().collect();
        assert_eq!(got, want, "ordered enumeration diverged from the model");
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn behaves_like_a_btree_map(actions in prop::collection::vec(any::<Action>(), 1..48)) {
        for reduced in [false, true] {
            let mut test = Test::new(reduced);
            for action in &actions {
                test.execute(action);
            }
            test.check_enumeration();
        }
    }

    #[test]
    fn modes_agree_with_each_other(actions in prop::collection::vec(any::<Action>(), 1..32)) {
        let mut standard = Test::new(false);
        let mut reduced = Test::new(true);
        for action in &actions {
            standard.execute(action);
            reduced.execute(action);
        }
        let std_vals: Vec<i32> = standard
            .trie
            .prefix_predict(b"")
            .map(|id| standard.trie.value(id).unwrap())
            .collect();
        let red_vals: Vec<i32> = reduced
            .trie
            .prefix_predict(b"")
            .map(|id| reduced.trie.value(id).unwrap())
            .collect();
        assert_eq!(std_vals, red_vals);
    }
}
