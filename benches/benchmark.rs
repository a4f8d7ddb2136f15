use criterion::{criterion_group, criterion_main, Criterion};
use opentoken::{CipherSuite, OpenTokenCodec};

pub fn criterion_benchmark(c: &mut Criterion) {
    let subject_pairs = [("subject".to_owned(), "alice".to_owned()), ("role".to_owned(), "admin".to_owned())];

    for suite in [CipherSuite::Aes256, CipherSuite::Aes128, CipherSuite::Des3] {
        let codec = OpenTokenCodec::new("correct horse battery staple").with_cipher_suite(suite);
        let otk = codec.create(subject_pairs.clone()).unwrap();

        c.bench_function(&format!("create suite={}", suite.id()), |b| {
            b.iter(|| codec.create(subject_pairs.clone()).unwrap());
        });
        c.bench_function(&format!("parse  suite={}", suite.id()), |b| {
            b.iter(|| codec.parse(&otk).unwrap());
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
