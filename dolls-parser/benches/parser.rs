use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use dolls_parser::lexer::tokenize;
use dolls_parser::parser::Parser;

fn expr(source: &str) {
    let tokens = tokenize(source).unwrap();
    let ast = Parser::new(tokens).parse_expr();
    assert!(ast.is_ok());
}

fn program(source: &str) {
    let ast = dolls_parser::parse_source(source);
    assert!(ast.is_ok());
}

fn long_expr(c: &mut Criterion) {
    let mut group = c.benchmark_group("long-expr");

    let mut source = "1".to_string();
    for _i in 0..1000 {
        source.push_str(" + 1");
    }
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("long-expr", |b| b.iter(|| expr(&source)));
}

fn stress_precedence(c: &mut Criterion) {
    let mut group = c.benchmark_group("stress-precedence");

    let mut source = "1".to_string();
    for _i in 0..200 {
        source.push_str(" == 2 < 3 + 5 * 5 | x & !y");
    }
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("stress-precedence", |b| b.iter(|| expr(&source)));
}

fn many_functions(c: &mut Criterion) {
    let mut group = c.benchmark_group("many-functions");

    let mut source = String::new();
    for i in 0..200 {
        source.push_str(&format!(
            "f{} = |a, b| {{ if (a < b) {{ a[0] += b }} elif (a) {{ b }} else {{ [a, b] }} }}\n",
            i
        ));
    }
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("many-functions", |b| b.iter(|| program(&source)));
}

criterion_group!(benches, long_expr, stress_precedence, many_functions);
criterion_main!(benches);
