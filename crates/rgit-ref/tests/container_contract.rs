//! Contract tests exercised against both container backends.

use bstr::BString;
use rgit_hash::ObjectId;
use rgit_ref::{check_ref_format, DictRefsContainer, DiskRefsContainer, RefName, RefsContainer};

fn oid(fill: u8) -> ObjectId {
    ObjectId::from_bytes(&[fill; 20]).unwrap()
}

fn name(s: &str) -> RefName {
    RefName::new(s).unwrap()
}

fn with_backends(test: impl Fn(&dyn RefsContainer)) {
    let dir = tempfile::tempdir().unwrap();
    let disk = DiskRefsContainer::new(dir.path());
    test(&disk);
    let memory = DictRefsContainer::new();
    test(&memory);
}

#[test]
fn added_ref_reads_back_until_removed() {
    with_backends(|refs| {
        let master = name("refs/heads/master");
        assert!(refs.add_if_new(&master, &oid(0xaa)).unwrap());
        assert_eq!(
            refs.read_ref(&master).unwrap().unwrap().as_direct(),
            Some(oid(0xaa))
        );
        assert!(refs.contains(&master).unwrap());

        // A non-matching removal leaves it in place.
        assert!(!refs.remove_if_equals(&master, Some(&oid(0xbb))).unwrap());
        assert!(refs.contains(&master).unwrap());

        assert!(refs.remove_if_equals(&master, Some(&oid(0xaa))).unwrap());
        assert!(refs.read_ref(&master).unwrap().is_none());
    });
}

#[test]
fn unconditional_set_always_lands() {
    with_backends(|refs| {
        let tag = name("refs/tags/v1.0");
        for fill in [0x11u8, 0x22, 0x33] {
            assert!(refs.set_if_equals(&tag, None, &oid(fill)).unwrap());
            assert_eq!(refs.resolve(&tag).unwrap(), oid(fill));
        }
    });
}

#[test]
fn keys_contain_exactly_what_was_written() {
    with_backends(|refs| {
        refs.set_ref(&name("refs/heads/a"), &oid(1)).unwrap();
        refs.set_ref(&name("refs/heads/b"), &oid(2)).unwrap();
        refs.set_ref(&name("refs/tags/v1.0"), &oid(3)).unwrap();

        let keys = refs.keys(None).unwrap();
        let expected: Vec<BString> = ["refs/heads/a", "refs/heads/b", "refs/tags/v1.0"]
            .into_iter()
            .map(BString::from)
            .collect();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), expected);

        let heads = refs.keys(Some("refs/heads")).unwrap();
        assert_eq!(heads.len(), 2);
        assert!(heads.contains(&BString::from("a")));
    });
}

#[test]
fn follow_is_depth_bounded() {
    with_backends(|refs| {
        let chain: Vec<RefName> = (0..7)
            .map(|i| name(&format!("refs/heads/link{i}")))
            .collect();
        for pair in chain.windows(2) {
            refs.set_symbolic_ref(&pair[0], &pair[1]).unwrap();
        }
        refs.set_ref(&chain[6], &oid(0x77)).unwrap();

        // Within the bound from deep enough in the chain; unknown from the
        // head of it.
        assert_eq!(refs.resolve(&chain[2]).unwrap(), oid(0x77));
        assert!(refs.resolve(&chain[0]).is_err());
    });
}

#[test]
fn check_ref_format_boundaries() {
    assert!(!check_ref_format("foo"));
    assert!(!check_ref_format("refs/.hidden"));
    assert!(check_ref_format("refs/heads/master"));
    assert!(!check_ref_format("refs/heads/master.lock"));
    assert!(!check_ref_format("refs/heads/a..b"));
}
