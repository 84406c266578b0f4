use diffxml::{DiffOptions, parse_str, write_delta};
use divan::{Bencher, black_box};

fn main() {
    divan::main();
}

/// A catalog of `books` entries, each with a few fields.
fn catalog(books: usize) -> String {
    let mut xml = String::from("<catalog>");
    for i in 0..books {
        xml.push_str(&format!(
            r#"<book id="b{i}"><title>Title {i}</title><author>Author {}</author><!--entry {i}--><price>{}.99</price></book>"#,
            i % 17,
            i % 50
        ));
    }
    xml.push_str("</catalog>");
    xml
}

/// Rotate the books, retitle every tenth and drop every seventh.
fn modify_catalog(books: usize) -> String {
    let mut xml = String::from("<catalog>");
    for n in 0..books {
        let i = (n + books / 3) % books;
        if i % 7 == 3 {
            continue;
        }
        let title = if i % 10 == 0 {
            format!("Revised {i}")
        } else {
            format!("Title {i}")
        };
        xml.push_str(&format!(
            r#"<book id="b{i}"><title>{title}</title><author>Author {}</author><!--entry {i}--><price>{}.99</price></book>"#,
            i % 17,
            i % 50
        ));
    }
    xml.push_str("</catalog>");
    xml
}

fn bench_diff(bencher: Bencher<'_, '_>, books: usize) {
    let old = catalog(books);
    let new = modify_catalog(books);
    let options = DiffOptions::default();
    bencher.bench_local(|| {
        let mut old_doc = parse_str(black_box(&old), &options.parse).unwrap();
        let mut new_doc = parse_str(black_box(&new), &options.parse).unwrap();
        let delta = diffxml::diff_documents(&mut old_doc, &mut new_doc, &options).unwrap();
        black_box(delta);
    });
}

#[divan::bench]
fn diff_small(bencher: Bencher) {
    bench_diff(bencher, 20);
}

#[divan::bench]
fn diff_medium(bencher: Bencher) {
    bench_diff(bencher, 200);
}

#[divan::bench]
fn diff_large(bencher: Bencher) {
    bench_diff(bencher, 1000);
}

// Parse-only baseline
#[divan::bench]
fn parse_medium(bencher: Bencher) {
    let xml = catalog(200);
    let options = DiffOptions::default();
    bencher.bench_local(|| {
        let doc = parse_str(black_box(&xml), &options.parse).unwrap();
        black_box(doc);
    });
}

#[divan::bench]
fn render_delta_medium(bencher: Bencher) {
    let delta =
        diffxml::diff_xml(&catalog(200), &modify_catalog(200), &DiffOptions::default()).unwrap();
    bencher.bench_local(|| {
        let rendered = write_delta(black_box(&delta)).unwrap();
        black_box(rendered);
    });
}
