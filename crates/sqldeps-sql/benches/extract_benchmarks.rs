//! Benchmarks for dependency extraction
//!
//! These benchmarks measure parsing plus extraction over generated scripts
//! with many statements, wide projections and nested subqueries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sqldeps_core::DialectConfig;
use sqldeps_sql::{DependencyExtractor, SqlParser};

/// Generate one SELECT with N columns, N/10 joins and a filter per join
fn generate_select(statement: usize, num_columns: usize) -> String {
    let num_joins = (num_columns / 10).max(1);
    let mut columns = Vec::new();
    let mut joins = Vec::new();
    let mut filters = Vec::new();

    for i in 0..num_columns {
        columns.push(format!("t{}.col_{}", i % (num_joins + 1), i));
    }

    for j in 1..=num_joins {
        joins.push(format!(
            "LEFT JOIN warehouse.table_{}_{} t{} ON t0.id = t{}.id",
            statement, j, j, j
        ));
        filters.push(format!("t{}.status IN ('open', 'held', UPPER('x'))", j));
    }

    format!(
        "SELECT {} FROM warehouse.table_{}_0 t0 {} WHERE t0.amount BETWEEN 1 AND 100 AND {}",
        columns.join(", "),
        statement,
        joins.join(" "),
        filters.join(" AND ")
    )
}

/// Generate a script of N statements mixing DDL, DML and queries
fn generate_script(num_statements: usize) -> String {
    let mut statements = Vec::new();

    for i in 0..num_statements {
        let statement = match i % 4 {
            0 => format!(
                "CREATE TABLE stage.s_{} AS {}",
                i,
                generate_select(i, 20)
            ),
            1 => format!(
                "INSERT INTO mart.facts_{} (id) SELECT s.id FROM stage.s_{} s \
                 WHERE EXISTS (SELECT 1 FROM warehouse.flags f WHERE f.id = s.id AND f.active = 1)",
                i,
                i - 1
            ),
            2 => format!(
                "WITH recent AS (SELECT id, amount FROM warehouse.orders_{} WHERE amount > 0) \
                 SELECT r.id, SUM(r.amount) FROM recent r GROUP BY r.id HAVING SUM(r.amount) > 10",
                i
            ),
            _ => generate_select(i, 10),
        };
        statements.push(statement);
    }

    statements.join(";\n")
}

/// Benchmark: Parsing only (100, 500, 1000 statements)
fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    let parser = SqlParser::new();

    for num_statements in [100, 500, 1000].iter() {
        let script = generate_script(*num_statements);

        group.bench_with_input(
            BenchmarkId::from_parameter(num_statements),
            num_statements,
            |b, _| {
                b.iter(|| black_box(parser.parse(&script, None)));
            },
        );
    }

    group.finish();
}

/// Benchmark: Full extraction over a script
fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let extractor = DependencyExtractor::new(DialectConfig::Ansi);

    for num_statements in [100, 500, 1000].iter() {
        let script = generate_script(*num_statements);

        group.bench_with_input(
            BenchmarkId::from_parameter(num_statements),
            num_statements,
            |b, _| {
                b.iter(|| black_box(extractor.extract(&script)));
            },
        );
    }

    group.finish();
}

/// Benchmark: Extraction on wide projections (pre-parsed)
fn bench_wide_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_select");
    let parser = SqlParser::new();
    let extractor = DependencyExtractor::default();

    for num_columns in [10, 100, 500].iter() {
        let sql = generate_select(0, *num_columns);
        let parsed = match parser.parse(&sql, None) {
            Ok(parsed) => parsed,
            Err(e) => panic!("generated SQL should parse: {}", e),
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(num_columns),
            num_columns,
            |b, _| {
                b.iter(|| black_box(extractor.extract_statements(&parsed.statements)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_extraction, bench_wide_select);
criterion_main!(benches);
