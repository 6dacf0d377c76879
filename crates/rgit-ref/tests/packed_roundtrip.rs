use std::collections::BTreeMap;

use proptest::prelude::*;
use rgit_hash::ObjectId;
use rgit_ref::packed::write_packed_refs;
use rgit_ref::{PackedRefs, RefName};

fn arb_oid() -> impl Strategy<Value = ObjectId> {
    proptest::collection::vec(any::<u8>(), 20..=20)
        .prop_map(|bytes| ObjectId::from_bytes(&bytes).unwrap())
}

fn arb_ref_name() -> impl Strategy<Value = RefName> {
    ("[a-z][a-z0-9-]{0,12}", "[a-z][a-z0-9-]{0,12}")
        .prop_map(|(dir, leaf)| RefName::new(format!("refs/{dir}/{leaf}")).unwrap())
}

proptest! {
    /// parse(write(T)) == T, with and without peeled annotations.
    #[test]
    fn packed_refs_roundtrip(
        entries in proptest::collection::btree_map(arb_ref_name(), (arb_oid(), any::<bool>()), 0..16),
        peeled_oid in arb_oid(),
        with_peeled in any::<bool>(),
    ) {
        let mut refs: BTreeMap<RefName, ObjectId> = BTreeMap::new();
        let mut peeled: BTreeMap<RefName, ObjectId> = BTreeMap::new();
        for (name, (oid, annotate)) in entries {
            if annotate {
                peeled.insert(name.clone(), peeled_oid);
            }
            refs.insert(name, oid);
        }

        let mut out = Vec::new();
        let peeled_arg = with_peeled.then_some(&peeled);
        write_packed_refs(&mut out, &refs, peeled_arg).unwrap();

        let reparsed = PackedRefs::parse(&out).unwrap();
        prop_assert_eq!(reparsed.has_peeled_header(), with_peeled);
        prop_assert_eq!(reparsed.len(), refs.len());
        for (name, oid) in &refs {
            prop_assert_eq!(reparsed.get(name), Some(*oid));
            if with_peeled {
                prop_assert_eq!(reparsed.peeled(name), peeled.get(name).copied());
            } else {
                prop_assert_eq!(reparsed.peeled(name), None);
            }
        }
    }

    /// Serializing a parsed table reproduces it exactly.
    #[test]
    fn parse_write_parse_is_identity(
        entries in proptest::collection::btree_map(arb_ref_name(), arb_oid(), 0..16),
    ) {
        let mut out = Vec::new();
        write_packed_refs(&mut out, &entries, None).unwrap();

        let packed = PackedRefs::parse(&out).unwrap();
        let mut rewritten = Vec::new();
        packed.write(&mut rewritten).unwrap();
        prop_assert_eq!(out, rewritten);
    }
}
