// Benchmarks for the split-node RGA.
//
// - Sequential typing, forward and backspace
// - Random inserts and deletes
// - Remote replay of a recorded edit trace
// - Garbage collection of a heavily edited document

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use concord::crdt::EditOp;
use concord::crdt::Text;
use concord::crdt::primitives::LamportClock;
use concord::crdt::primitives::TimeTicket;
use concord::key::KeyPair;

fn new_text(seed: u64) -> (Text, LamportClock, KeyPair) {
    let user = KeyPair::from_seed(seed);
    return (Text::new(TimeTicket::INITIAL), LamportClock::new(user.actor), user);
}

/// Type content character-by-character at the end (forward typing)
fn sequential_forward(text: &mut Text, clock: &mut LamportClock, content: &str) {
    for (i, ch) in content.chars().enumerate() {
        text.edit_by_index(i, i, ch.encode_utf8(&mut [0; 4]), clock.tick()).unwrap();
    }
}

/// Insert everything, then delete from the end one by one (backspace)
fn sequential_backward(text: &mut Text, clock: &mut LamportClock, content: &str) {
    text.edit_by_index(0, 0, content, clock.tick()).unwrap();
    while !text.is_empty() {
        let len = text.len();
        text.edit_by_index(len - 1, len, "", clock.tick()).unwrap();
    }
}

/// Mixed insert and delete operations, 70% inserts
fn mixed_operations(
    text: &mut Text,
    clock: &mut LamportClock,
    user: &KeyPair,
    ops: usize,
    rng: &mut StdRng,
) -> Vec<EditOp> {
    let mut log = Vec::with_capacity(ops);
    for _ in 0..ops {
        let len = text.len();
        let (from, to, content) = if len == 0 || rng.gen_bool(0.7) {
            let pos = rng.gen_range(0..=len);
            (pos, pos, (rng.gen_range(b'a'..=b'z') as char).to_string())
        } else {
            let pos = rng.gen_range(0..len);
            (pos, pos + 1, String::new())
        };
        let edited_at = clock.tick();
        let range = text.create_range(from, to).unwrap();
        let (deleted, _, _) = text.edit(range, &content, edited_at, None).unwrap();
        log.push(EditOp::local(user, range, &content, edited_at, deleted));
    }
    return log;
}

fn bench_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");

    for size in [100, 1000, 10000] {
        let content: String = (0..size).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("forward", size), &content, |b, content| {
            b.iter(|| {
                let (mut text, mut clock, user) = new_text(1);
                sequential_forward(&mut text, &mut clock, content);
                black_box(text.len())
            });
        });

        group.bench_with_input(BenchmarkId::new("backward", size), &content, |b, content| {
            b.iter(|| {
                let (mut text, mut clock, user) = new_text(1);
                sequential_backward(&mut text, &mut clock, content);
                black_box(text.removed_nodes_len())
            });
        });
    }

    group.finish();
}

fn bench_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("random");

    for ops in [100, 1000, 5000] {
        group.throughput(Throughput::Elements(ops as u64));
        group.bench_with_input(BenchmarkId::new("mixed", ops), &ops, |b, &ops| {
            b.iter(|| {
                let (mut text, mut clock, user) = new_text(1);
                let mut rng = StdRng::seed_from_u64(42);
                mixed_operations(&mut text, &mut clock, &user, ops, &mut rng);
                black_box(text.len())
            });
        });
    }

    group.finish();
}

fn bench_remote_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("remote_replay");

    for ops in [1000, 5000] {
        let (mut text, mut clock, user) = new_text(1);
        let mut rng = StdRng::seed_from_u64(7);
        let log = mixed_operations(&mut text, &mut clock, &user, ops, &mut rng);

        group.throughput(Throughput::Elements(ops as u64));
        group.bench_with_input(BenchmarkId::new("replay", ops), &log, |b, log| {
            b.iter(|| {
                let mut replica = Text::new(TimeTicket::INITIAL);
                for op in log {
                    op.execute(&mut replica).unwrap();
                }
                black_box(replica.len())
            });
        });
    }

    group.finish();
}

fn bench_purge(c: &mut Criterion) {
    let mut group = c.benchmark_group("purge");

    for ops in [1000, 5000] {
        let (mut text, mut clock, user) = new_text(1);
        let mut rng = StdRng::seed_from_u64(11);
        mixed_operations(&mut text, &mut clock, &user, ops, &mut rng);

        group.bench_with_input(BenchmarkId::new("all", ops), &text, |b, text| {
            b.iter(|| {
                let mut copy = text.deepcopy();
                black_box(copy.purge_removed_nodes_before(&TimeTicket::MAX))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sequential, bench_random, bench_remote_replay, bench_purge);
criterion_main!(benches);
