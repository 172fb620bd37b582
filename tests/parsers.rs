use std::io::Write;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;

use metagenscope_cli::dispatch;
use metagenscope_cli::error::MgsError;
use metagenscope_cli::parsers::{
    AGS_KEY, GENOME_EQUIVALENTS_KEY, ParsedResult, Scalar, TOTAL_BASES_KEY, parse_microbe_census,
    parse_mpa,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn abundance(result: &ParsedResult, taxon: &str) -> f64 {
    result.as_table().unwrap()[taxon].as_f64()
}

fn approx_eq(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

#[test]
fn kraken_abundances_are_normalized_by_top_level_total() {
    let total = 7_398_030.0;
    let result = parse_mpa(&fixture("kraken.mpa")).unwrap();
    let table = result.as_table().unwrap();
    assert_eq!(table.len(), 6);

    assert!(approx_eq(abundance(&result, "d__Viruses"), 1733.0 / total));
    assert!(approx_eq(abundance(&result, "d__Bacteria"), 7_396_285.0 / total));
    assert!(approx_eq(abundance(&result, "d__Archaea"), 12.0 / total));
    assert!(approx_eq(
        abundance(&result, "d__Bacteria|p__Proteobacteria"),
        7_285_377.0 / total
    ));

    let top_level: f64 = table
        .iter()
        .filter(|(taxon, _)| !taxon.contains('|'))
        .map(|(_, value)| value.as_f64())
        .sum();
    assert!(approx_eq(top_level, 1.0));
}

#[test]
fn metaphlan2_profile_through_dispatch() {
    let result = dispatch::parse(
        "metaphlan2_taxonomy_profiling",
        [("mpa", fixture("metaphlan2.mpa"))],
    )
    .unwrap();
    assert_eq!(result.as_table().unwrap().len(), 5);
    assert!(approx_eq(abundance(&result, "k__Bacteria"), 0.9588884));
    assert!(approx_eq(abundance(&result, "k__Viruses"), 0.0411116));
}

#[test]
fn microbe_census_fields_are_typed() {
    let result = parse_microbe_census(&fixture("mic_census")).unwrap();
    let table = result.as_table().unwrap();
    assert_eq!(table[AGS_KEY], Scalar::Float(70513906.6967));
    assert_eq!(table[TOTAL_BASES_KEY], Scalar::Int(1709470396));
    assert_eq!(table[GENOME_EQUIVALENTS_KEY], Scalar::Float(24.2430249022));
}

#[test]
fn microbe_census_ignores_line_order() {
    let mut reordered = tempfile::NamedTempFile::new().unwrap();
    reordered
        .write_all(
            b"genome_equivalents:\t24.2430249022\ntotal_bases:\t1709470396\naverage_genome_size:\t70513906.6967\n",
        )
        .unwrap();
    let expected = parse_microbe_census(&fixture("mic_census")).unwrap();
    let actual = parse_microbe_census(reordered.path()).unwrap();
    assert_eq!(actual, expected);
}

#[test]
fn microbe_census_missing_total_bases() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"average_genome_size:\t70513906.6967\ngenome_equivalents:\t24.2\n")
        .unwrap();
    let err = parse_microbe_census(file.path()).unwrap_err();
    assert_matches!(err, MgsError::MissingRequiredField(field) if field == TOTAL_BASES_KEY);
}

#[test]
fn read_classification_is_passed_through() {
    let result = dispatch::parse(
        "read_classification_proportions",
        [("json", fixture("reads_classified.json"))],
    )
    .unwrap();
    assert_matches!(result, ParsedResult::Json(value) if value["host"] == 0.2352021372463073);
}

#[test]
fn resistome_tables_are_nested_by_category() {
    let dir = tempfile::tempdir().unwrap();
    let mut schema = Vec::new();
    for (role, key) in [
        ("gene", "mecA"),
        ("group", "MECA"),
        ("classus", "betalactams"),
        ("mech", "Penicillin_binding_protein"),
    ] {
        let path = dir.path().join(format!("s1.resistome_amrs.{role}"));
        std::fs::write(&path, format!("Sample\tName\tHits\ns1\t{key}\t7\n")).unwrap();
        schema.push((role, path));
    }

    let result = dispatch::parse("resistome_amrs", schema).unwrap();
    let records = result.as_records().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records["genes"]["mecA"], Scalar::Int(7));
    assert_eq!(records["mechanisms"]["Penicillin_binding_protein"], Scalar::Int(7));
}

#[test]
fn humann2_normalized_genes_zip_both_tables() {
    let dir = tempfile::tempdir().unwrap();
    let read_depth = dir.path().join("s1.humann2_normalize_genes.read_depth_norm_genes");
    let ags = dir.path().join("s1.humann2_normalize_genes.ags_norm_genes");
    std::fs::write(&read_depth, "# Gene\tRPKM\nUniRef90_A0A.1\t2.0\nUniRef90_B0B\t4.0\n").unwrap();
    std::fs::write(&ags, "# Gene\tRPKMG\nUniRef90_A0A.1\t0.5\nUniRef90_B0B\t1.5\n").unwrap();

    let result = dispatch::parse(
        "humann2_normalize_genes",
        [("read_depth_norm_genes", read_depth), ("ags_norm_genes", ags)],
    )
    .unwrap();
    let records = result.as_records().unwrap();
    assert_eq!(records["UniRef90_A0A_1"]["rpkm"], Scalar::Float(2.0));
    assert_eq!(records["UniRef90_B0B"]["rpkmg"], Scalar::Float(1.5));
}

#[test]
fn gene_table_result_serializes_as_nested_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b",vfA,vfB\nrpk,10,20\nrpkm,1.5,2.5\nrpkmg,0.1,0.2\n")
        .unwrap();
    let result = dispatch::parse("vfdb_quantify", [("table", file.path())]).unwrap();
    let json = result.to_json().unwrap();
    assert_eq!(json["vfA"]["rpk"], 10.0);
    assert_eq!(json["vfB"]["rpkmg"], 0.2);
}
