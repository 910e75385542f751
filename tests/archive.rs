mod common;

use common::{fixed_now, unzip};
use xlsxide_pdf::{
    Config, Error, ErrorPolicy, Record, build_archive_at, convert_xlsx_to_zip, read_records,
};

fn unnamed(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| [("Description", format!("entry {i}"))].into_iter().collect())
        .collect()
}

fn named(name: &str) -> Record {
    [("Nome", name), ("Resumo", "text")].into_iter().collect()
}

fn oversized(name: &str) -> Record {
    let mut record = named(name);
    record.push("Abstract", "word ".repeat(6000));
    record
}

#[test]
fn unnamed_records_use_positional_names_in_order() {
    let archive =
        build_archive_at(&unnamed(3), &Config::default(), ErrorPolicy::Abort, fixed_now()).unwrap();
    let zip = archive.to_zip().unwrap();
    let names: Vec<String> = unzip(&zip).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["project_1.pdf", "project_2.pdf", "project_3.pdf"]);
    for (_, data) in unzip(&zip) {
        assert!(data.starts_with(b"%PDF-"));
    }
}

#[test]
fn zero_records_give_an_empty_archive() {
    let archive =
        build_archive_at(&[], &Config::default(), ErrorPolicy::Abort, fixed_now()).unwrap();
    assert!(archive.is_empty());
    assert!(unzip(&archive.to_zip().unwrap()).is_empty());
}

#[test]
fn colliding_names_are_disambiguated() {
    let records = vec![named("Ana Silva"), named(" Ana  Silva"), named("Ana Silva")];
    let archive =
        build_archive_at(&records, &Config::default(), ErrorPolicy::Abort, fixed_now()).unwrap();
    let names: Vec<&str> = archive.entries().iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(names, ["Ana_Silva.pdf", "Ana__Silva.pdf", "Ana_Silva_2.pdf"]);
    assert_eq!(archive.entries()[2].record_index, 2);
}

#[test]
fn path_separators_never_reach_the_archive() {
    let archive = build_archive_at(
        &[named("R&D / Phase\\2")],
        &Config::default(),
        ErrorPolicy::Abort,
        fixed_now(),
    )
    .unwrap();
    assert_eq!(archive.entries()[0].file_name, "R&D_-_Phase-2.pdf");
}

#[test]
fn abort_policy_stops_at_the_failing_record() {
    let records = vec![named("ok"), oversized("broken"), named("later")];
    let err = build_archive_at(&records, &Config::default(), ErrorPolicy::Abort, fixed_now())
        .unwrap_err();
    match &err {
        Error::Record { index, name, source } => {
            assert_eq!(*index, 1);
            assert_eq!(name, "broken");
            assert!(matches!(**source, Error::LayoutImpossible { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("record 2 (broken):"));
}

#[test]
fn skip_policy_keeps_the_rest() {
    let _ = env_logger::try_init();
    let records = vec![named("ok"), oversized("broken"), named("later")];
    let archive =
        build_archive_at(&records, &Config::default(), ErrorPolicy::Skip, fixed_now()).unwrap();
    let names: Vec<&str> = archive.entries().iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(names, ["ok.pdf", "later.pdf"]);
    assert_eq!(archive.skipped().len(), 1);
    assert_eq!(archive.skipped()[0].record_index, 1);
    assert_eq!(archive.skipped()[0].name, "broken");
}

#[test]
fn converts_a_workbook_file_into_a_zip_file() {
    let _ = env_logger::try_init();
    let dir = std::env::temp_dir().join(format!("xlsxide-archive-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("projetos.xlsx");
    let output = dir.join("projetos_pdfs.zip");
    std::fs::write(
        &input,
        common::workbook(
            &["Nome", "Orientador", "Orientador", ""],
            &[
                &["Projeto Alfa", "C. Reis", "C. Reis", "stray"],
                &["", "D. Melo", "", ""],
            ],
        ),
    )
    .unwrap();

    let records = read_records(&input).unwrap();
    assert_eq!(records[0].get("Unnamed: 3").map(|v| v.display()).as_deref(), Some("stray"));

    let archive =
        convert_xlsx_to_zip(&input, &output, &Config::default(), ErrorPolicy::Abort).unwrap();
    assert_eq!(archive.len(), 2);

    let entries = unzip(&std::fs::read(&output).unwrap());
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["Projeto_Alfa.pdf", "project_2.pdf"]);
    assert_eq!(
        entries[0].1.as_slice(),
        &*archive.get("Projeto_Alfa.pdf").unwrap().bytes
    );

    let split = dir.join("individual");
    archive.write_dir(&split).unwrap();
    assert!(split.join("project_2.pdf").is_file());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_workbook_is_an_io_error() {
    let missing = std::env::temp_dir().join("xlsxide-does-not-exist.xlsx");
    let out = std::env::temp_dir().join("xlsxide-never-written.zip");
    assert!(matches!(
        convert_xlsx_to_zip(&missing, &out, &Config::default(), ErrorPolicy::Abort),
        Err(Error::Io(_))
    ));
    assert!(!out.exists());
}
