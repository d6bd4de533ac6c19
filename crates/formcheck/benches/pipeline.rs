use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use formcheck::{from_str, populate, stripped, validate, NoCustomValidity, Request};

const CONTACT_FORM: &str = include_str!("../tests/fixtures/valid/contact.xml");
const SURVEY_FORM: &str = include_str!("../tests/fixtures/valid/survey.xml");

fn contact_request() -> Request {
    Request::post()
        .field("your_name", "Ada Lovelace")
        .field("email", "ada@example.org")
        .field("message", "Hello there,\nplease call me back.")
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("formcheck_parse_contact", |b| {
        b.iter(|| from_str(black_box(CONTACT_FORM)))
    });
    c.bench_function("formcheck_parse_survey", |b| {
        b.iter(|| from_str(black_box(SURVEY_FORM)))
    });
}

fn bench_populate_validate(c: &mut Criterion) {
    let Ok(doc) = from_str(CONTACT_FORM) else {
        return;
    };
    let request = contact_request();
    c.bench_function("formcheck_populate_validate", |b| {
        b.iter(|| {
            let mut doc = doc.clone();
            populate(&mut doc, black_box(&request));
            validate(&mut doc, "contact", &NoCustomValidity)
        })
    });
}

fn bench_strip(c: &mut Criterion) {
    let Ok(mut doc) = from_str(CONTACT_FORM) else {
        return;
    };
    populate(&mut doc, &contact_request());
    c.bench_function("formcheck_strip", |b| b.iter(|| stripped(black_box(&doc))));
}

criterion_group!(benches, bench_parse, bench_populate_validate, bench_strip);
criterion_main!(benches);
