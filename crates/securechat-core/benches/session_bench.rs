//! Benchmarks for the session protocol

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use securechat_core::Chatter;

fn connected() -> (Chatter, Chatter) {
    let alice = Chatter::new();
    let bob = Chatter::new();
    let ephemeral = alice.initiate_handshake(&bob.public_key()).unwrap();
    let (reply, _) = bob
        .return_handshake(&alice.public_key(), &ephemeral)
        .unwrap();
    alice
        .finalize_handshake(&bob.public_key(), &reply)
        .unwrap();
    (alice, bob)
}

fn bench_handshake(c: &mut Criterion) {
    c.bench_function("handshake", |b| {
        b.iter_batched(
            || (Chatter::new(), Chatter::new()),
            |(alice, bob)| {
                let ephemeral = alice.initiate_handshake(&bob.public_key()).unwrap();
                let (reply, _) = bob
                    .return_handshake(&alice.public_key(), &ephemeral)
                    .unwrap();
                black_box(alice.finalize_handshake(&bob.public_key(), &reply).unwrap())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_messaging(c: &mut Criterion) {
    let mut group = c.benchmark_group("Session");

    for size in [64, 1024, 16384].iter() {
        let plaintext = vec![0x42u8; *size];

        group.bench_with_input(BenchmarkId::new("send", size), &plaintext, |b, pt| {
            let (alice, bob) = connected();
            b.iter(|| black_box(alice.send(&bob.public_key(), pt).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("send_receive", size), &plaintext, |b, pt| {
            let (alice, bob) = connected();
            b.iter(|| {
                let msg = alice.send(&bob.public_key(), pt).unwrap();
                black_box(bob.receive(&msg).unwrap())
            })
        });
    }

    // Every turn performs a DH ratchet step on both sides
    group.bench_function("ping_pong", |b| {
        let (alice, bob) = connected();
        b.iter(|| {
            let ping = alice.send(&bob.public_key(), b"ping").unwrap();
            bob.receive(&ping).unwrap();
            let pong = bob.send(&alice.public_key(), b"pong").unwrap();
            black_box(alice.receive(&pong).unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_handshake, bench_messaging);
criterion_main!(benches);
