use isisdb_core::config::Config;
use isisdb_core::record::{Record, RecordStatus};
use isisdb_store::{MasterFile, XrfEntry, XrfFile, XrfStatus};

fn open_db(dir: &std::path::Path, name: &str) -> MasterFile {
    MasterFile::open(dir.join(name), &Config::default()).unwrap()
}

fn sample_record() -> Record {
    let mut record = Record::new();
    record.set(24, "Methodology of plant eco-physiology");
    record.set(70, vec!["Smith, J.^bEd.", "Doe, A."]);
    record.set(90, "keywords^aecology^bplants");
    record
}

#[test]
fn write_then_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut mst = open_db(dir.path(), "cds");

    let mut record = sample_record();
    mst.save(&mut record, false).unwrap();
    assert_eq!(record.mfn, 1);
    assert_eq!(mst.next_mfn(), 2);

    let back = mst.get(1).unwrap().unwrap();
    assert_eq!(back, record);
    assert_eq!(back.status, RecordStatus::Active);
    assert_eq!(back.get(70).unwrap().occurrence_count(), 2);
    assert_eq!(back.get(70).unwrap().data(), "Smith, J.^bEd.Doe, A.");
}

#[test]
fn reopen_sees_saved_records() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut mst = open_db(dir.path(), "cds");
        let mut r1 = sample_record();
        mst.save(&mut r1, false).unwrap();
        let mut r2 = Record::new();
        r2.set(24, "Second record");
        mst.save(&mut r2, false).unwrap();
    }

    let mut mst = open_db(dir.path(), "cds");
    assert_eq!(mst.next_mfn(), 3);
    assert_eq!(mst.get(1).unwrap().unwrap(), sample_record());
    assert_eq!(mst.get(2).unwrap().unwrap().get(24).unwrap().data(), "Second record");
    assert!(mst.get(3).unwrap().is_none());
}

#[test]
fn delete_then_undelete_restores_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut mst = open_db(dir.path(), "cds");
    let mut record = sample_record();
    mst.save(&mut record, false).unwrap();

    mst.delete(1).unwrap();
    let deleted = mst.get(1).unwrap().unwrap();
    assert_eq!(deleted.status, RecordStatus::LogicallyDeleted);
    assert_eq!(deleted, record);

    // double delete is refused
    assert!(mst.delete(1).is_err());

    mst.undelete(1).unwrap();
    let restored = mst.get(1).unwrap().unwrap();
    assert_eq!(restored.status, RecordStatus::Active);
    assert_eq!(restored, record);
    assert!(mst.undelete(1).is_err());
}

#[test]
fn update_keeps_backward_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let mut mst = open_db(dir.path(), "cds");

    let mut record = sample_record();
    mst.save(&mut record, false).unwrap();
    // first save of a fresh mfn carries the new flag; saving again keeps it
    // and never records a pointer
    mst.save(&mut record, false).unwrap();
    assert_eq!((record.mfbwb, record.mfbwp), (0, 0));

    // a reindex pass clears the new flag
    mst.save(&mut record, true).unwrap();

    let mut updated = mst.get(1).unwrap().unwrap();
    updated.set(24, "Revised title");
    mst.save(&mut updated, false).unwrap();
    assert_ne!((updated.mfbwb, updated.mfbwp), (0, 0));

    let current = mst.get(1).unwrap().unwrap();
    assert_eq!(current.get(24).unwrap().data(), "Revised title");

    let prior = mst.previous(&current).unwrap().unwrap();
    assert_eq!(prior.get(24).unwrap().data(), "Methodology of plant eco-physiology");
}

#[test]
fn iteration_skips_missing_slots() {
    let dir = tempfile::tempdir().unwrap();
    let mut mst = open_db(dir.path(), "cds");
    for i in 0..3 {
        let mut record = Record::new();
        record.set(24, format!("title {i}"));
        mst.save(&mut record, false).unwrap();
    }

    let collected: Vec<_> = mst.records().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(collected.len(), 3);
    assert!(collected.iter().all(|r| r.is_some()));
    assert_eq!(mst.active_count().unwrap(), 3);

    mst.delete(2).unwrap();
    assert_eq!(mst.active_count().unwrap(), 2);
}

#[test]
fn many_records_cross_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let mut mst = open_db(dir.path(), "big");

    let payload = "x".repeat(120);
    for i in 1..=64u32 {
        let mut record = Record::new();
        record.set(24, format!("{i}: {payload}"));
        mst.save(&mut record, false).unwrap();
    }
    for i in 1..=64u32 {
        let record = mst.get(i).unwrap().unwrap();
        assert!(record.get(24).unwrap().data().starts_with(&format!("{i}:")));
    }
}

#[test]
fn xrf_word_round_trip_over_live_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut mst = open_db(dir.path(), "cds");
    for _ in 0..5 {
        let mut record = sample_record();
        record.mfn = 0;
        mst.save(&mut record, false).unwrap();
    }
    drop(mst);

    let config = Config::default();
    let mut xrf = XrfFile::open(&dir.path().join("cds.xrf"), &config, 0, true).unwrap();
    for mfn in 1..=5 {
        let entry = xrf.entry(mfn, &config).unwrap();
        assert_eq!(entry.status(), XrfStatus::Active);
        let word = entry.encode(&config, 0);
        assert_eq!(XrfEntry::decode(word, &config, 0), entry);
    }
    // the single block is the last block
    assert!(xrf.block_header(1).unwrap() < 0);
}

#[test]
fn fdt_resolves_names() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cds.fdt"),
        "Author    dp  70  100  0  1\nTitle    t  24  200  0  0\n",
    )
    .unwrap();
    let mst = open_db(dir.path(), "cds");
    assert_eq!(mst.resolve_tag("Author"), Some(70));
    assert_eq!(mst.resolve_tag("v24"), Some(24));
    assert_eq!(mst.resolve_tag("26"), Some(26));
    assert_eq!(mst.resolve_tag("Missing"), None);
}

#[test]
fn ini_overrides_apply() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cds.ini"), "[IsisDB]\nMAX_LINE_WIDTH = 40\n").unwrap();
    let mst = open_db(dir.path(), "cds");
    assert_eq!(mst.config.max_line_width, 40);
}
