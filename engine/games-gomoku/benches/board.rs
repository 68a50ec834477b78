use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use games_gomoku::Board;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// A 15x15 position after `plies` random moves that has not ended.
fn midgame(seed: u64, plies: usize) -> Board {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    loop {
        let mut board = Board::default();
        for _ in 0..plies {
            let legal = board.legal_actions();
            let Some(&action) = legal.choose(&mut rng) else {
                break;
            };
            board = board.apply(action).unwrap();
        }
        if !board.is_terminal() {
            return board;
        }
    }
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("gomoku_apply");
    group.bench_function("apply_empty", |b| {
        let board = Board::default();
        b.iter(|| board.apply(black_box(112)).unwrap());
    });
    group.bench_function("apply_midgame", |b| {
        let board = midgame(3, 40);
        let action = board.legal_actions()[0];
        b.iter_batched(
            || board.clone(),
            |board| board.apply(black_box(action)).unwrap(),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_legal_actions(c: &mut Criterion) {
    let mut group = c.benchmark_group("gomoku_legal_actions");
    group.bench_function("empty", |b| {
        let board = Board::default();
        b.iter(|| black_box(board.legal_actions()));
    });
    group.bench_function("midgame", |b| {
        let board = midgame(5, 60);
        b.iter(|| black_box(board.legal_actions()));
    });
    group.finish();
}

fn bench_random_game(c: &mut Criterion) {
    c.bench_function("gomoku_random_game", |b| {
        b.iter_batched(
            || ChaCha20Rng::seed_from_u64(9),
            |mut rng| {
                let mut board = Board::default();
                while !board.is_terminal() {
                    let legal = board.legal_actions();
                    let action = *legal.choose(&mut rng).unwrap();
                    board = board.apply(action).unwrap();
                }
                board.result()
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_apply, bench_legal_actions, bench_random_game);
criterion_main!(benches);
