//! Benchmarks for the rendezvous hot paths
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rendezvous::hub::Hub;
use rendezvous::protocol::{parse_client_frame, ConnectionId};
use rendezvous::transport::connection_table::ConnectionTable;
use rendezvous::validation::{is_valid_wallet_address, sanitize_signal_payload};
use serde_json::json;
use std::sync::Arc;

const ALICE: &str = "7EcDhSYGxXyscszYEp35KHN8vvw3svAuLKTzXwCFLtV";
const BOB: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

fn bench_wallet_validation(c: &mut Criterion) {
    c.bench_function("validate_wallet_address", |b| {
        b.iter(|| is_valid_wallet_address(black_box(ALICE)))
    });
}

fn bench_signal_sanitize(c: &mut Criterion) {
    let payload = json!({
        "signal": {
            "type": "offer",
            "sdp": "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
            "junkField": 1
        },
        "peer": "x"
    });

    c.bench_function("sanitize_signal_payload", |b| {
        b.iter(|| sanitize_signal_payload(black_box(&payload)))
    });
}

fn bench_parse_frame(c: &mut Criterion) {
    let frame = format!(r#"{{"event":"ready","data":{{"walletAddress":"{}"}}}}"#, ALICE);

    c.bench_function("parse_ready_frame", |b| {
        b.iter(|| parse_client_frame(black_box(&frame)).unwrap())
    });
}

fn bench_match_and_teardown(c: &mut Criterion) {
    let table = Arc::new(ConnectionTable::new());
    let hub = Hub::new(table.clone());
    let a = ConnectionId::from("a");
    let b = ConnectionId::from("b");
    let mut a_rx = table.register(a.clone());
    let mut b_rx = table.register(b.clone());

    c.bench_function("ready_match_disconnect", |bench| {
        bench.iter(|| {
            hub.on_ready(&a, ALICE);
            hub.on_ready(&b, BOB);
            hub.on_disconnect(&a);
            hub.on_disconnect(&b);
            while a_rx.try_recv().is_ok() {}
            while b_rx.try_recv().is_ok() {}
        })
    });
}

criterion_group!(
    benches,
    bench_wallet_validation,
    bench_signal_sanitize,
    bench_parse_frame,
    bench_match_and_teardown
);
criterion_main!(benches);
