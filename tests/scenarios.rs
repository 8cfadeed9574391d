//! End-to-end scenarios over real on-disk databases.

use std::rc::Rc;

use isisdb::{Collection, Config, MemoryIndex, Posting, Record, Session};

fn collection(dir: &std::path::Path) -> Rc<Collection> {
    Collection::open("test", &[dir], Config::default()).unwrap()
}

fn seed_db(dir: &std::path::Path, name: &str, records: &[Vec<(u32, &str)>]) {
    let mut mst =
        isisdb::MasterFile::open(dir.join(name), &Config::default()).unwrap();
    for fields in records {
        let mut record = Record::new();
        for (tag, data) in fields {
            match record.get(*tag) {
                Some(_) => record.add_occurrence(isisdb::Field::new(*tag, *data)),
                None => record.set(*tag, *data),
            }
        }
        mst.save(&mut record, false).unwrap();
    }
}

#[test]
fn seed_suite() {
    let dir = tempfile::tempdir().unwrap();
    seed_db(
        dir.path(),
        "cds",
        &[
            // mfn 1..11 filler so a record lands on mfn 12
            vec![(24, "one")],
            vec![(24, "two")],
            vec![(24, "three")],
            vec![(24, "four")],
            vec![(24, "five")],
            vec![(24, "six")],
            vec![(24, "seven")],
            vec![(24, "eight")],
            vec![(24, "nine")],
            vec![(24, "ten")],
            vec![(24, "eleven")],
            vec![
                (24, "Methodology of plant eco-physiology"),
                (70, "Smith, J.^bEd."),
                (90, "alpha"),
                (90, "beta"),
                (90, "gamma"),
            ],
        ],
    );

    let collection = collection(dir.path());
    let ctx = collection.context("cds").unwrap();
    let mut session = Session::new();
    let mut record = ctx.master().borrow_mut().get(12).unwrap().unwrap();

    // 1. fixed-width numeric rendering on an empty record
    let mut empty = Record::new();
    assert_eq!(
        session.format(&ctx, &mut empty, "f(42, 6, 0)").unwrap(),
        "    42"
    );

    // 2. zero-padded mfn
    assert_eq!(session.format(&ctx, &mut record, "mfn(5)").unwrap(), "00012");

    // 3. mode-driven punctuation
    assert_eq!(
        session.format(&ctx, &mut record, "mpl, v70").unwrap(),
        "Smith, J.^bEd."
    );
    assert_eq!(
        session.format(&ctx, &mut record, "mdu,v70").unwrap(),
        "SMITH, J., ED.  "
    );

    // 4. branching on field presence
    let branch = r#"if p(v10) then "has ten: ", v10 else "no ten" fi"#;
    assert_eq!(session.format(&ctx, &mut record, branch).unwrap(), "no ten");
    record.set(10, "value");
    assert_eq!(
        session.format(&ctx, &mut record, branch).unwrap(),
        "has ten: value"
    );

    // 5. repeatable group with separator
    assert_eq!(
        session.format(&ctx, &mut record, "(v90+|; |)").unwrap(),
        "alpha; beta; gamma"
    );

    // 6. proc adds a field visible to later formats
    session
        .format(&ctx, &mut record, "proc('a70 new text')")
        .unwrap();
    assert_eq!(
        session.format(&ctx, &mut record, "v70[2]").unwrap(),
        "new text"
    );
}

#[test]
fn cross_database_ref() {
    let dir = tempfile::tempdir().unwrap();
    seed_db(dir.path(), "cds", &[vec![(24, "main title"), (77, "2")]]);
    seed_db(
        dir.path(),
        "aux",
        &[vec![(24, "first aux")], vec![(24, "second aux")]],
    );

    let collection = collection(dir.path());
    let ctx = collection.context("cds").unwrap();
    let mut session = Session::new();
    let mut record = ctx.master().borrow_mut().get(1).unwrap().unwrap();

    assert_eq!(
        session
            .format(&ctx, &mut record, "ref->aux(val(v77), v24)")
            .unwrap(),
        "second aux"
    );

    // same-database dereference
    assert_eq!(
        session.format(&ctx, &mut record, "ref(1, v24)").unwrap(),
        "main title"
    );

    // unknown databases propagate
    assert!(session
        .format(&ctx, &mut record, "ref->nodb(1, v24)")
        .is_err());
}

#[test]
fn inverted_lookups() {
    let dir = tempfile::tempdir().unwrap();
    seed_db(dir.path(), "cds", &[vec![(24, "plants")], vec![(24, "plants")]]);

    let collection = collection(dir.path());
    let ctx = collection.context("cds").unwrap();

    let mut index = MemoryIndex::new();
    for mfn in [1u32, 2] {
        index.insert(
            "plants",
            Posting {
                mfn,
                extraction_id: 1,
                occ: 1,
                offset: 0,
                technique: 0,
                field_tag: 24,
            },
        );
    }
    ctx.set_index(None, Rc::new(index));

    let mut session = Session::new();
    let mut record = ctx.master().borrow_mut().get(1).unwrap().unwrap();
    assert_eq!(
        session.format(&ctx, &mut record, "f(l('plants'), 1, 0)").unwrap(),
        "1"
    );
    assert_eq!(
        session
            .format(&ctx, &mut record, "f(npost('plants'), 1, 0)")
            .unwrap(),
        "2"
    );
    assert_eq!(
        session.format(&ctx, &mut record, "f(l('missing'), 1, 0)").unwrap(),
        "0"
    );
}

#[test]
fn gizmo_replacement() {
    let dir = tempfile::tempdir().unwrap();
    seed_db(dir.path(), "cds", &[vec![(24, "colour of colourful things")]]);
    seed_db(dir.path(), "giz", &[vec![(1, "colour"), (2, "color")]]);

    let collection = collection(dir.path());
    let ctx = collection.context("cds").unwrap();
    let mut session = Session::new();
    let mut record = ctx.master().borrow_mut().get(1).unwrap().unwrap();

    session
        .format(&ctx, &mut record, "proc('ggiz,24')")
        .unwrap();
    assert_eq!(record.get(24).unwrap().data(), "color of colorful things");
}

#[test]
fn mstname_and_cat() {
    let dir = tempfile::tempdir().unwrap();
    seed_db(dir.path(), "cds", &[vec![(24, "x")]]);
    std::fs::write(dir.path().join("note.txt"), "from a file").unwrap();

    let collection = collection(dir.path());
    let ctx = collection.context("cds").unwrap();
    let mut session = Session::new();
    let mut record = ctx.master().borrow_mut().get(1).unwrap().unwrap();

    assert_eq!(session.format(&ctx, &mut record, "mstname").unwrap(), "cds");
    assert_eq!(
        session
            .format(&ctx, &mut record, "cat('note.txt')")
            .unwrap(),
        "from a file"
    );
    assert_eq!(
        session.format(&ctx, &mut record, "cat('absent.txt')").unwrap(),
        ""
    );
}

#[test]
fn ref_cache_is_per_database() {
    let dir = tempfile::tempdir().unwrap();
    seed_db(dir.path(), "cds", &[vec![(24, "original")]]);

    let collection = collection(dir.path());
    let ctx = collection.context("cds").unwrap();
    let mut session = Session::new();
    let mut record = ctx.master().borrow_mut().get(1).unwrap().unwrap();

    assert_eq!(
        session.format(&ctx, &mut record, "ref(1, v24)").unwrap(),
        "original"
    );

    // mutate on disk: the cached ref record keeps answering
    let mut updated = ctx.master().borrow_mut().get(1).unwrap().unwrap();
    updated.set(24, "changed");
    ctx.master().borrow_mut().save(&mut updated, false).unwrap();

    assert_eq!(
        session.format(&ctx, &mut record, "ref(1, v24)").unwrap(),
        "original"
    );
}
