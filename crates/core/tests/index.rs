use std::collections::HashMap;

use proptest::prelude::*;

use snapsync_core::format::StrRef;
use snapsync_core::index::{Index, IndexError, SigMap, NO_XREFS};
use snapsync_core::model::Walk;

/// Concatenate `keys` into one buffer and return a reference per key.
fn key_buffer(keys: &[&str]) -> (Vec<u8>, Vec<StrRef>) {
    let mut bytes = Vec::new();
    let mut refs = Vec::new();
    for key in keys {
        refs.push(StrRef { offset: bytes.len() as u32, len: key.len() as u32 });
        bytes.extend_from_slice(key.as_bytes());
    }
    (bytes, refs)
}

/// Index `refs` with each key owned by its own record.
fn signature_index(bytes: &[u8], refs: &[StrRef]) -> Index {
    let owners: Vec<u32> = (0..refs.len() as u32).collect();
    owned_signature_index(bytes, refs, &owners)
}

fn owned_signature_index(bytes: &[u8], refs: &[StrRef], owners: &[u32]) -> Index {
    let mut index = Index::new();
    let mut sigmap = SigMap::new();
    for (idx, (key, owner)) in refs.iter().zip(owners).enumerate() {
        index
            .insert_signature(&mut sigmap, bytes, *key, idx as u32, *owner)
            .expect("insert signature");
    }
    index.finish_signatures(sigmap).expect("finish signatures");
    index
}

#[test]
fn object_lookup_after_unordered_insertion() {
    let mut index = Index::new();
    for (idx, id) in [0x30u64, 0x10, 0x20].into_iter().enumerate() {
        index.insert_object(id, idx as u32).expect("insert");
    }
    index.finish_objects().expect("finish");

    assert_eq!(index.find_object_id(0x30), Some(0));
    assert_eq!(index.find_object_id(0x10), Some(1));
    assert_eq!(index.find_object_id(0x20), Some(2));
    assert_eq!(index.find_object_id(0x40), None);
    assert_eq!(index.num_objects(), 3);
}

#[test]
fn sealed_phases_reject_further_insertion() {
    let mut index = Index::new();
    index.insert_object(1, 0).expect("insert");
    index.finish_objects().expect("finish");
    assert_eq!(index.insert_object(2, 1), Err(IndexError::Sealed("object")));
    assert_eq!(index.finish_objects(), Err(IndexError::Sealed("object")));

    index.finish_signatures(SigMap::new()).expect("finish signatures");
    let (bytes, refs) = key_buffer(&["abc"]);
    let mut sigmap = SigMap::new();
    assert_eq!(
        index.insert_signature(&mut sigmap, &bytes, refs[0], 0, 0),
        Err(IndexError::Sealed("signature"))
    );

    index.finish_xrefs(|_, _| {}).expect("finish xrefs");
    assert_eq!(index.insert_xref_to(0, 1), Err(IndexError::Sealed("xref")));
}

#[test]
fn duplicate_object_ids_are_rejected() {
    let mut index = Index::new();
    index.insert_object(7, 0).expect("insert");
    index.insert_object(7, 1).expect("insert");
    assert_eq!(index.finish_objects(), Err(IndexError::DuplicateObject(7)));
}

#[test]
fn buckets_keep_insertion_order_and_uniqueness_is_global() {
    // "aa" is inserted first and collides only with the very last entry.
    let keys = ["aa", "bb", "cc", "bb", "aa"];
    let (bytes, refs) = key_buffer(&keys);
    let index = signature_index(&bytes, &refs);

    assert!(!index.is_unique(&bytes, b"aa"));
    assert!(!index.is_unique(&bytes, b"bb"));
    assert!(index.is_unique(&bytes, b"cc"));
    assert!(!index.is_unique(&bytes, b"zz"));
    assert_eq!(index.num_with_signature(&bytes, b"aa"), 2);
    assert_eq!(index.num_with_signature(&bytes, b"zz"), 0);

    let mut seen = Vec::new();
    index.walk_signature_bucket(&bytes, b"bb", |sig| {
        seen.push(sig.idx);
        Walk::Continue
    });
    assert_eq!(seen, vec![1, 3]);

    let mut unique = Vec::new();
    index.walk_all_unique_signatures(|sig| {
        unique.push(sig.idx);
        Walk::Continue
    });
    assert_eq!(unique, vec![2]);
    assert_eq!(index.num_signatures(), 5);
    assert_eq!(index.num_unique_signatures(), 1);
}

/// A record repeating one value under several methods still owns it alone.
#[test]
fn repeated_value_in_one_record_stays_unique() {
    let (bytes, refs) = key_buffer(&["abcd", "abcd", "other", "pair", "pair"]);
    let index = owned_signature_index(&bytes, &refs, &[0, 0, 1, 1, 2]);

    assert!(index.is_unique(&bytes, b"abcd"));
    assert_eq!(index.num_with_signature(&bytes, b"abcd"), 1);
    assert!(!index.is_unique(&bytes, b"pair"));
    assert_eq!(index.num_with_signature(&bytes, b"pair"), 2);

    let mut walked = Vec::new();
    index.walk_signature_bucket(&bytes, b"abcd", |sig| {
        walked.push((sig.idx, sig.owner));
        Walk::Continue
    });
    assert_eq!(walked, vec![(0, 0)]);

    let mut unique = Vec::new();
    index.walk_all_unique_signatures(|sig| {
        unique.push((sig.idx, sig.owner));
        Walk::Continue
    });
    assert_eq!(unique, vec![(0, 0), (2, 1)]);
    assert_eq!(index.num_signatures(), 5);
    assert_eq!(index.num_unique_signatures(), 2);
}

#[test]
fn bucket_walk_stops_early() {
    let (bytes, refs) = key_buffer(&["k", "k", "k"]);
    let index = signature_index(&bytes, &refs);
    let mut calls = 0;
    index.walk_signature_bucket(&bytes, b"k", |_| {
        calls += 1;
        Walk::Stop
    });
    assert_eq!(calls, 1);
}

#[test]
fn prefix_keys_do_not_share_buckets() {
    let (bytes, refs) = key_buffer(&["ab", "abc", "a"]);
    let index = signature_index(&bytes, &refs);
    assert!(index.is_unique(&bytes, b"a"));
    assert!(index.is_unique(&bytes, b"ab"));
    assert!(index.is_unique(&bytes, b"abc"));
}

#[test]
fn reverse_xrefs_are_resolved_grouped_and_deduplicated() {
    let mut index = Index::new();
    for (idx, id) in [0x100u64, 0x200, 0x300].into_iter().enumerate() {
        index.insert_object(id, idx as u32).expect("insert");
    }
    // 0 -> 0x200 twice, 2 -> 0x200, 1 -> 0x300, 0 -> unknown.
    for (from, to) in [(0, 0x200), (2, 0x200), (0, 0x200), (1, 0x300), (0, 0x999)] {
        index.insert_xref_to(from, to).expect("insert xref");
    }
    index.finish_objects().expect("finish objects");
    index.finish_signatures(SigMap::new()).expect("finish signatures");

    let mut starts = vec![NO_XREFS; 3];
    index.finish_xrefs(|to, start| starts[to as usize] = start).expect("finish xrefs");
    assert_eq!(index.num_xrefs_to(), 3);
    assert_eq!(starts[0], NO_XREFS);

    let collect = |to: u32| {
        let mut from = Vec::new();
        index.walk_xrefs_to(to, starts[to as usize], |idx| {
            from.push(idx);
            Walk::Continue
        });
        from
    };
    assert!(collect(0).is_empty());
    assert_eq!(collect(1), vec![0, 2]);
    assert_eq!(collect(2), vec![1]);
}

proptest! {
    /// Counts, uniqueness and walks agree with a per-record tally, including
    /// records that carry the same value more than once.
    #[test]
    fn signature_counts_match_owners(
        records in prop::collection::vec(prop::collection::vec("[a-d]{1,2}", 0..4), 0..20)
    ) {
        let mut key_refs: Vec<&str> = Vec::new();
        let mut owners: Vec<u32> = Vec::new();
        for (owner, keys) in records.iter().enumerate() {
            for key in keys {
                key_refs.push(key.as_str());
                owners.push(owner as u32);
            }
        }
        let (bytes, refs) = key_buffer(&key_refs);
        let index = owned_signature_index(&bytes, &refs, &owners);

        let mut expected: HashMap<&str, Vec<u32>> = HashMap::new();
        for (key, owner) in key_refs.iter().zip(&owners) {
            let entry = expected.entry(*key).or_default();
            if entry.last() != Some(owner) {
                entry.push(*owner);
            }
        }

        for (key, key_owners) in &expected {
            prop_assert_eq!(index.num_with_signature(&bytes, key.as_bytes()), key_owners.len());
            prop_assert_eq!(index.is_unique(&bytes, key.as_bytes()), key_owners.len() == 1);
            let mut walked = Vec::new();
            index.walk_signature_bucket(&bytes, key.as_bytes(), |sig| {
                walked.push(sig.owner);
                Walk::Continue
            });
            prop_assert_eq!(&walked, key_owners);
        }

        let mut unique = Vec::new();
        index.walk_all_unique_signatures(|sig| {
            unique.push((sig.key.resolve(&bytes).to_vec(), sig.owner));
            Walk::Continue
        });
        unique.sort_unstable();
        let mut expected_unique: Vec<(Vec<u8>, u32)> = expected
            .iter()
            .filter(|(_, o)| o.len() == 1)
            .map(|(key, o)| (key.as_bytes().to_vec(), o[0]))
            .collect();
        expected_unique.sort_unstable();
        prop_assert_eq!(unique, expected_unique);
        prop_assert_eq!(index.num_signatures(), key_refs.len());
    }
}
