//! Integration test: exports + tracker CSVs → grouped, attributed, file-expanded commits.

use std::path::Path;
use std::sync::Arc;

use stratum_core::{IssueKind, StratumConfig, StratumError};
use stratum_linkage::files::ChangeLister;
use stratum_linkage::normalize::KeyNormalizer;
use stratum_linkage::pipeline::{consolidate, link};

/// Lists one view file per raw identifier.
struct EchoLister;

impl ChangeLister for EchoLister {
    async fn list_files(&self, raw_id: &str) -> Result<Vec<String>, StratumError> {
        Ok(vec![format!("siop/siop-war/{raw_id}.xhtml")])
    }
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    dir
}

fn populate(path: &Path) {
    write(
        path,
        "siop-changesets-2010-March.json",
        r#"{"changes":[
            {"uuid":"_a1","author":"ana","comment":"Corrige cálculo de juros","modified":"15-mar-2010 02:30 PM"},
            {"uuid":"_a2","author":"ana","comment":"Corrige cálculo de juros","modified":"2010-mar-15 02:30 PM"},
            {"uuid":"_b1","author":"bia","comment":"Relatório mensal - parte 2","modified":"20-mar-2010 10:05 AM"},
            {"uuid":"_c1","author":"caio","comment":"Ajuste #777 layout","modified":"22-mar-2010 12:15 AM"},
            {"uuid":"_d1","author":"ana","comment":"<nenhum comentário>","modified":"25-mar-2010 04:00 PM"},
            {"uuid":"_e1","author":"ana","comment":"shared","modified":"26-mar-2010 09:00 AM"}
        ]}"#,
    );
    write(
        path,
        "siop-changesets-2010-April.json",
        r#"{"changes":[
            {"uuid":"_a3","author":"ana","comment":"Corrige cálculo de juros","modified":"15-mar-2010 02:30 PM"},
            {"uuid":"_f1","author":"bia","comment":"abril","Modified":"01-abr-2010 09:00 AM"}
        ]}"#,
    );
    write(
        path,
        "defects.csv",
        "Type,Id,Summary,Feature,Changesets\n\
         Defect,301,Juros errados,Financeiro: juros,\"1 - Corrige cálculo de juros - ana - 15/03/2010 14:30\n2 - shared - ana - 26/03/2010 09:00\"\n",
    );
    write(
        path,
        "stories.csv",
        "a,Id,c,d,e,f,g,h,Story,Changesets\n\
         x,x,x,x,x,x,x,x,#812,\"5 - Relatório mensal - parte 2 - bia - 20/03/2010 10:05\r\n6 - shared - ana - 26/03/2010 09:00\n7 - ghost - zé - 01/01/2010 10:00\"\n",
    );
    write(
        path,
        "features.csv",
        "a,Id,c,d,e,f,g,h,i,j,Feature\nx,812,c,d,e,f,g,h,i,j,Relatórios: mensal\n",
    );
    write(path, "siop-issues.csv", "777,0\n301,1\n");
}

#[test]
fn link_attributes_every_group() {
    let dir = fixture();
    let linkage = link(dir.path(), &StratumConfig::default().linkage).unwrap();

    // The April file repeats a March change; the month guard drops it.
    assert_eq!(linkage.skipped, 1);

    let attribution = &linkage.attribution;
    let comments: Vec<&str> = attribution
        .changesets
        .iter()
        .map(|c| c.group.comment.as_str())
        .collect();
    assert_eq!(
        comments,
        vec![
            "",
            "abril",
            "Ajuste #777 layout",
            "Corrige cálculo de juros",
            "Relatório mensal - parte 2",
            "shared",
        ]
    );

    let by_comment = |comment: &str| {
        attribution
            .changesets
            .iter()
            .find(|c| c.group.comment == comment)
            .unwrap()
    };

    let fix = by_comment("Corrige cálculo de juros");
    assert_eq!(fix.group.raw_ids, vec!["_a1", "_a2"]);
    assert_eq!(fix.attribution.feature, "Financeiro");
    assert_eq!(fix.attribution.issue.kind, IssueKind::Bug);

    let report = by_comment("Relatório mensal - parte 2");
    assert_eq!(report.attribution.issue.id, "812");
    assert_eq!(report.attribution.feature, "Relatórios");

    // Claimed by defect 301, then story 812: last write wins.
    let shared = by_comment("shared");
    assert_eq!(shared.attribution.issue.id, "812");
    assert_eq!(attribution.conflicts.len(), 1);
    assert_eq!(attribution.conflicts[0].previous.issue.id, "301");

    let ticket = by_comment("Ajuste #777 layout");
    assert_eq!(ticket.attribution.issue.id, "777");
    assert_eq!(ticket.attribution.issue.kind, IssueKind::Story);
    assert!(ticket.attribution.feature.is_empty());

    assert!(by_comment("").attribution.issue.is_unattributed());
    assert!(by_comment("abril").attribution.issue.is_unattributed());

    assert_eq!(attribution.unresolved.len(), 1);
    assert_eq!(attribution.unresolved[0].row_id, "812");
}

#[test]
fn export_directory_name_is_not_a_pattern() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("siop[2010]");
    std::fs::create_dir(&dir).unwrap();
    populate(&dir);

    let linkage = link(&dir, &StratumConfig::default().linkage).unwrap();
    assert_eq!(linkage.attribution.changesets.len(), 6);
    assert_eq!(linkage.attribution.unresolved.len(), 1);
}

#[test]
fn strict_references_abort_on_missing_changeset() {
    let dir = fixture();
    let mut config = StratumConfig::default();
    config.linkage.strict_references = true;

    let err = link(dir.path(), &config.linkage).unwrap_err();
    match err {
        StratumError::UnresolvedReference { key } => {
            assert_eq!(key, "ghost - zé - 01/01/2010 10:00");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_tracker_file_is_reported() {
    let dir = fixture();
    std::fs::remove_file(dir.path().join("features.csv")).unwrap();
    let err = link(dir.path(), &StratumConfig::default().linkage).unwrap_err();
    assert!(matches!(err, StratumError::FileNotFound(_)));
}

#[tokio::test]
async fn consolidate_expands_files_per_raw_id() {
    let dir = fixture();
    let mut config = StratumConfig::default();
    config.resolver.concurrency = 2;

    let mut calls = 0;
    let result = consolidate(dir.path(), &config, Arc::new(EchoLister), |done, _| {
        calls = done;
    })
    .await
    .unwrap();

    assert_eq!(result.commits.len(), 6);
    assert_eq!(calls, 7);

    let fix = result
        .commits
        .iter()
        .find(|c| c.issue.id == "301")
        .unwrap();
    assert_eq!(
        fix.files,
        vec!["siop/siop-war/_a1.xhtml", "siop/siop-war/_a2.xhtml"]
    );
    assert_eq!(fix.change.modified, "15/03/2010 14:30");

    let json = serde_json::to_value(&result.commits).unwrap();
    assert!(json[0]["change"]["rawIds"].is_array());
}

#[test]
fn descriptor_key_matches_raw_key() {
    let normalizer = KeyNormalizer::default();
    let cases = [
        ("Corrige cálculo de juros", "ana", "15-mar-2010 02:30 PM"),
        ("merge - part 2 - final", "Bia", "2010-dez-31 11:59 PM"),
        ("<Nenhum Comentário>", "caio", "01-jan-2010 12:15 AM"),
        (
            "a very long comment that certainly exceeds the fifty-six character limit",
            "zé",
            "09-set-2010 12:00 PM",
        ),
    ];
    for (comment, author, modified) in cases {
        let raw = normalizer.key(comment, author, modified).unwrap();
        let canonical = normalizer.canonical_timestamp(modified).unwrap();
        let descriptor = format!("99 - {comment} - {author} - {canonical}");
        assert_eq!(
            normalizer.descriptor_key(&descriptor).as_deref(),
            Some(raw.as_str()),
            "descriptor {descriptor:?}"
        );
    }
}
