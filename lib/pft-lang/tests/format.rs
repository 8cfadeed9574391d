use isisdb_core::record::Record;
use pft_lang::runtime::format_source;
use pft_lang::NullDatabase;

fn sample() -> Record {
    let mut record = Record::new();
    record.mfn = 12;
    record.set(10, "value");
    record.set(24, "Methodology of plant eco-physiology");
    record.set(70, "Smith, J.^bEd.");
    record.set(90, vec!["alpha", "beta", "gamma"]);
    record.set(44, "a1.5b2.0");
    record
}

fn run(source: &str) -> String {
    run_on(source, &mut sample())
}

fn run_on(source: &str, record: &mut Record) -> String {
    let db = NullDatabase::default();
    format_source(&db, record, source).unwrap()
}

#[test]
fn f_renders_fixed_width() {
    let mut empty = Record::new();
    assert_eq!(run_on("f(42, 6, 0)", &mut empty), "    42");
    assert_eq!(run_on("f(3.14159, 8, 2)", &mut empty), "    3.14");
}

#[test]
fn mfn_zero_pads() {
    assert_eq!(run("mfn(5)"), "00012");
    assert_eq!(run("mfn"), "000012");
}

#[test]
fn heading_and_data_modes() {
    assert_eq!(run("mpl, v70"), "Smith, J.^bEd.");
    assert_eq!(run("mhl, v70"), "Smith, J., Ed.");
    assert_eq!(run("mdu,v70"), "SMITH, J., ED.  ");
}

#[test]
fn data_mode_closes_short_literals() {
    // the closing rule has no length threshold
    assert_eq!(run("mdl, select '1' case '1': 'ok' endsel"), "ok.  ");
    assert_eq!(run("mdl, select '1' case '1': 'a;' endsel"), "a;  ");
}

#[test]
fn branch_on_presence() {
    let mut record = Record::new();
    record.set(10, "value");
    assert_eq!(
        run_on(r#"if p(v10) then "has ten: ", v10 else "no ten" fi"#, &mut record),
        "has ten: value"
    );

    let mut record = Record::new();
    assert_eq!(
        run_on(r#"if p(v10) then "has ten: ", v10 else "no ten" fi"#, &mut record),
        "no ten"
    );
}

#[test]
fn repeatable_group_with_separator() {
    assert_eq!(run("(v90+|; |)"), "alpha; beta; gamma");
}

#[test]
fn proc_adds_a_field() {
    let mut record = sample();
    run_on("proc('a70 new text')", &mut record);
    assert_eq!(run_on("v70[2]", &mut record), "new text");
}

#[test]
fn conditional_literal_laws() {
    assert_eq!(run(r#""[", v10, "]""#), "[value]");

    let mut without = Record::new();
    assert_eq!(run_on(r#""[", v10, "]""#, &mut without), "");

    // a repeatable prefix flagged with + skips the leading boundary
    assert_eq!(run("|, |+v90"), "alpha, beta, gamma");
    // an unflagged one decorates every occurrence
    assert_eq!(run("|, |v90"), ", alpha, beta, gamma");
}

#[test]
fn dummy_descriptors() {
    let mut record = Record::new();
    assert_eq!(run_on(r#""missing "n10"!""#, &mut record), "missing !");
    record.set(10, "x");
    assert_eq!(run_on(r#""missing "n10"!""#, &mut record), "");
    assert_eq!(run_on(r#""present"d10"#, &mut record), "present");
}

#[test]
fn size_and_type() {
    assert_eq!(run("size('hello')"), "5");
    assert_eq!(run("size(v90)"), "14");
    assert_eq!(run("type('1234')"), "N");
    assert_eq!(run("type('ABC')"), "A");
    assert_eq!(run("type('a-b')"), "X");
}

#[test]
fn numeric_extraction_and_aggregates() {
    assert_eq!(run("val(v44)"), "1.5");
    assert_eq!(run("rsum(v44)"), "3.5");
    assert_eq!(run("rmin(v44)"), "1.5");
    assert_eq!(run("rmax(v44)"), "2");
    assert_eq!(run("ravr(v44)"), "1.75");
    assert_eq!(run("rsum(1, 2, 3.5)"), "6.5");
}

#[test]
fn substring_functions() {
    assert_eq!(run("mid('abcdef', 2, 3)"), "bcd");
    assert_eq!(run("mid('abc', 0, 2)"), "ab");
    assert_eq!(run("left('abcdef', 2)"), "ab");
    assert_eq!(run("right('abcdef', 2)"), "ef");
    assert_eq!(run("right('abc', 9)"), "abc");
    assert_eq!(run("replace('banana', 'na', 'NA')"), "baNANA");
    assert_eq!(run("instr('abcabc', 'ca')"), "3");
    assert_eq!(run("instr('abc', 'z')"), "0");
}

#[test]
fn arithmetic_and_relations() {
    assert_eq!(run("f(1 + 2 * 3, 1, 0)"), "7");
    assert_eq!(run("f(7 / 2, 3, 1)"), "3.5");
    assert_eq!(run(r#"if 2 > 1 and not (1 > 2) then 'yes' fi"#), "yes");
    assert_eq!(run(r#"if v24 : 'plant' then 'found' fi"#), "found");
    assert_eq!(run(r#"if 'abc' = 'abc' then 'eq' fi"#), "eq");
}

#[test]
fn variables() {
    assert_eq!(run("s1 := 'text', s1"), "text");
    assert_eq!(run("e1 := 2, f(e1 + 1, 1, 0)"), "3");
    assert_eq!(run("e1 := 2, v90[e1]"), "beta");
    assert_eq!(run("mpu, s5 := 'up', s5"), "UP");
}

#[test]
fn unknown_occurrence_variable_is_fatal() {
    let db = NullDatabase::default();
    let mut record = sample();
    assert!(format_source(&db, &mut record, "v90[e9]").is_err());
}

#[test]
fn while_loop() {
    assert_eq!(
        run("e1 := 1, while e1 <= 3 ( f(e1, 1, 0), e1 := e1 + 1 )"),
        "123"
    );
}

#[test]
fn select_statement() {
    let source = "select v10 case 'value': 'matched' case 'other': 'wrong' elsecase 'none' endsel";
    assert_eq!(run(source), "matched");

    let mut record = Record::new();
    record.set(10, "zzz");
    assert_eq!(run_on(source, &mut record), "none");
}

#[test]
fn occurrence_selectors() {
    assert_eq!(run("v90[2]"), "beta");
    assert_eq!(run("v90[LAST]"), "gamma");
    assert_eq!(run("v90[2..3]"), "betagamma");
    assert_eq!(run("v90[2..LAST]"), "betagamma");
    assert_eq!(run("v90[5]"), "");
    assert_eq!(run("nocc(v90), 'x', nocc(v10), 'x', nocc(v99)"), "3x1x0");
}

#[test]
fn iocc_counts_occurrences() {
    assert_eq!(run("(f(iocc, 1, 0), v90+|, |)"), "1alpha, 2beta, 3gamma");
}

#[test]
fn group_break_and_continue() {
    assert_eq!(
        run("(if iocc > 2 then break fi, v90+|; |)"),
        "alpha; beta; "
    );
}

#[test]
fn slicers() {
    assert_eq!(run("v24*5.6"), "dology");
    assert_eq!(run("v24.11"), "Methodology");
    assert_eq!(run("v24*12"), "of plant eco-physiology");
}

#[test]
fn line_width_discipline() {
    let out = run("lw(20), v24");
    assert!(!out.is_empty());
    for line in out.lines() {
        assert!(line.trim_end().chars().count() <= 20, "{out:?}");
    }

    // a single token longer than the window is cut hard
    let mut record = Record::new();
    record.set(24, "x".repeat(50));
    let out = run_on("lw(10), v24", &mut record);
    assert!(out.lines().count() > 1);
}

#[test]
fn alignment_indents() {
    let mut record = Record::new();
    record.set(24, "words repeated again and again and again over the width");
    let out = run_on("lw(30), v24(4,2)", &mut record);
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].starts_with("    words"), "{out:?}");
    assert!(lines[1].starts_with("  "), "{out:?}");
}

#[test]
fn newline_override() {
    assert_eq!(run("newline('|'), 'a'#'b'"), "a|b");
}

#[test]
fn spacers() {
    assert_eq!(run("'a', x3, 'b'"), "a   b");
    assert_eq!(run("'a', c5, 'b'"), "a   b");
    assert_eq!(run("'ab'%'c'"), "abc");
    // a spacer after an empty field is dropped
    assert_eq!(run("'a', v99/, 'b'"), "ab");
}

#[test]
fn seconds_round_trips_datex() {
    let out = run("datex(seconds('20200102 030405'))");
    assert!(out.starts_with("20200102 030405"), "{out}");
}

#[test]
fn subfield_access() {
    assert_eq!(run("v70^b"), "Ed.");
    assert_eq!(run("v70^*"), "Smith, J.");
    assert_eq!(run("v70^z"), "");
}

#[test]
fn proc_commands() {
    let mut record = sample();
    run_on("proc('d70')", &mut record);
    assert!(record.get(70).is_none());

    run_on("proc('d90/2')", &mut record);
    assert_eq!(record.get(90).unwrap().data(), "alphagamma");

    run_on("proc('gsplit/clean=24= ')", &mut record);
    assert_eq!(
        record.get(24).unwrap().data(),
        "Methodologyofplanteco-physiology"
    );

    run_on("proc('d*')", &mut record);
    assert!(record.is_empty());

    let mut record = Record::new();
    run_on("proc('h33 10 pad')", &mut record);
    assert_eq!(record.get(33).unwrap().data(), "pad       ");
}

#[test]
fn proc_applies_every_add_command() {
    let mut record = Record::new();
    run_on("proc('a10 one a20 two')", &mut record);
    assert_eq!(record.get(10).unwrap().data(), "one");
    assert_eq!(record.get(20).unwrap().data(), "two");

    // two occurrences of the same tag accumulate
    let mut record = Record::new();
    run_on("proc('a10 first a10 second')", &mut record);
    assert_eq!(record.get(10).unwrap().occurrence_count(), 2);
    assert_eq!(record.get(10).unwrap().data(), "firstsecond");

    // adds and heading-adds mix, each bounded by the next command
    let mut record = Record::new();
    run_on("proc('a10 plain h33 5 pad')", &mut record);
    assert_eq!(record.get(10).unwrap().data(), "plain");
    assert_eq!(record.get(33).unwrap().data(), "pad  ");
}
