use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use http::Method;
use serde_json::json;
use tasknet::http::encoding::ParameterEncoding;
use tasknet::http::multipart::{Form, Part};
use tasknet::http::request::RequestDescriptor;
use tasknet::http::Parameters;

fn parameters() -> Parameters {
    let mut p = Parameters::new();
    for i in 0..16 {
        p.insert(format!("key{i}"), json!(format!("value {i} & more")));
    }
    p.insert("count".into(), json!(42));
    p.insert("enabled".into(), json!(true));
    p
}

fn benchmark_parameter_encodings(c: &mut Criterion) {
    let params = parameters();

    for (name, method, encoding) in [
        ("encode_query", Method::GET, ParameterEncoding::Query),
        ("encode_form", Method::POST, ParameterEncoding::Form),
        ("encode_json", Method::POST, ParameterEncoding::Json),
    ] {
        let descriptor = RequestDescriptor::parse(method, "http://example.com/api/items")
            .unwrap()
            .with_parameters(params.clone())
            .with_encoding(encoding);

        c.bench_function(name, |b| b.iter(|| black_box(&descriptor).encode().unwrap()));
    }
}

fn benchmark_multipart(c: &mut Criterion) {
    let blob = Bytes::from(vec![0xabu8; 256 * 1024]);
    let form = (0..8).fold(Form::new(), |form, i| {
        form.part(Part::bytes(blob.clone()).name(format!("file{i}")))
    });

    c.bench_function("multipart_encode_2mb", |b| {
        b.iter(|| black_box(&form).encode().unwrap())
    });

    c.bench_function("multipart_content_length", |b| {
        b.iter(|| black_box(&form).content_length())
    });
}

criterion_group!(benches, benchmark_parameter_encodings, benchmark_multipart);
criterion_main!(benches);
