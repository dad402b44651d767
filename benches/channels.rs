use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tokio::task::LocalSet;

use strand::select::{self, recv};
use strand::{bounded, unbounded, Channel, UnboundedChannel};

const ITEMS: usize = 1_000;

fn rt() -> tokio::runtime::Runtime {
  tokio::runtime::Builder::new_current_thread()
    .build()
    .expect("current-thread runtime")
}

fn bench_bounded_pipe(c: &mut Criterion) {
  let rt = rt();
  c.bench_function("bounded_pipe_cap16", |b| {
    b.iter(|| {
      rt.block_on(LocalSet::new().run_until(async {
        let chan = bounded::<usize>(16);
        let tx = chan.clone();
        let producer = tokio::task::spawn_local(async move {
          for i in 0..ITEMS {
            tx.send(i).await.unwrap();
          }
        });
        for _ in 0..ITEMS {
          black_box(chan.recv().await.unwrap());
        }
        producer.await.unwrap();
      }))
    })
  });
}

fn bench_rendezvous_ping_pong(c: &mut Criterion) {
  let rt = rt();
  c.bench_function("rendezvous_ping_pong", |b| {
    b.iter(|| {
      rt.block_on(LocalSet::new().run_until(async {
        let chan = bounded::<usize>(0);
        let tx = chan.clone();
        let producer = tokio::task::spawn_local(async move {
          for i in 0..ITEMS {
            tx.send(i).await.unwrap();
          }
        });
        for _ in 0..ITEMS {
          black_box(chan.recv().await.unwrap());
        }
        producer.await.unwrap();
      }))
    })
  });
}

fn bench_unbounded_burst(c: &mut Criterion) {
  let rt = rt();
  c.bench_function("unbounded_burst", |b| {
    b.iter(|| {
      rt.block_on(async {
        let chan = unbounded::<usize>();
        for i in 0..ITEMS {
          chan.send(i).await.unwrap();
        }
        for _ in 0..ITEMS {
          black_box(chan.recv().await.unwrap());
        }
      })
    })
  });
}

fn bench_select_fast_path(c: &mut Criterion) {
  let rt = rt();
  c.bench_function("select_first_ready", |b| {
    b.iter(|| {
      rt.block_on(async {
        let loaded: UnboundedChannel<usize> = (0..ITEMS).collect();
        let idle = unbounded::<usize>();
        for _ in 0..ITEMS {
          select::select([recv(&loaded), recv(&idle)]).await;
        }
        black_box(loaded.len())
      })
    })
  });
}

criterion_group!(
  benches,
  bench_bounded_pipe,
  bench_rendezvous_ping_pong,
  bench_unbounded_burst,
  bench_select_fast_path
);
criterion_main!(benches);
