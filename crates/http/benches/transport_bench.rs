use std::hint::black_box;

use bytes::BytesMut;
use criterion::{Criterion, criterion_group, criterion_main};
use http::{Response, StatusCode, header};
use rpc_http::codec::{HeaderDecoder, HeaderEncoder, LengthDecoder};
use rpc_http::protocol::PayloadSize;
use tokio_util::codec::{Decoder, Encoder};

const RPC_REQUEST: &[u8] = b"POST /rpc HTTP/1.1\r\n\
Host: localhost:6800\r\n\
User-Agent: bench\r\n\
Accept-Encoding: gzip, deflate\r\n\
Content-Type: application/json\r\n\
Content-Length: 64\r\n\r\n";

fn bench_header_decoder(c: &mut Criterion) {
    c.bench_function("decode_rpc_header", |b| {
        b.iter(|| {
            let mut bytes = BytesMut::from(RPC_REQUEST);
            black_box(HeaderDecoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_length_decoder(c: &mut Criterion) {
    let body = vec![b'x'; 64 * 1024];

    c.bench_function("decode_64k_body_in_4k_reads", |b| {
        b.iter(|| {
            let mut decoder = LengthDecoder::new(body.len() as u64);
            let mut received = BytesMut::with_capacity(body.len());
            for piece in body.chunks(4096) {
                let mut src = BytesMut::from(piece);
                while let Some(item) = decoder.decode(&mut src).unwrap() {
                    match item.into_bytes() {
                        Some(bytes) => received.extend_from_slice(&bytes),
                        None => break,
                    }
                }
            }
            black_box(received);
        });
    });
}

fn bench_header_encoder(c: &mut Criterion) {
    c.bench_function("encode_rpc_response_header", |b| {
        b.iter(|| {
            let head = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json-rpc")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(())
                .unwrap();
            let mut bytes = BytesMut::new();
            black_box(HeaderEncoder.encode((head, PayloadSize::Length(128)), &mut bytes).unwrap());
        });
    });
}

criterion_group!(benches, bench_header_decoder, bench_length_decoder, bench_header_encoder);
criterion_main!(benches);
