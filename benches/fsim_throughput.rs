//! Throughput benchmark for packed-pattern/single-fault simulation

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use quaigh_atpg::fault::FaultDb;
use quaigh_atpg::network::{Network, Signal};
use quaigh_atpg::rtpg::Rtpg;
use quaigh_atpg::tpg_network::TpgNetwork;

/// A ripple-carry-ish chain of `width` AND/XOR gates, wide enough to exercise the
/// packed event queue across more than one pattern word
fn chain_network(width: usize) -> Network {
    let mut net = Network::new();
    net.add_inputs(width + 1);
    let mut acc = Signal::from_input(0);
    for i in 0..width {
        let b = Signal::from_input((i + 1) as u32);
        acc = net.and(acc, b);
        let c = net.xor(acc, b);
        acc = c;
    }
    net.add_output(acc);
    net
}

fn bench_ppsfp(c: &mut Criterion) {
    let mut group = c.benchmark_group("ppsfp");
    for &width in &[32usize, 128, 512] {
        let net = chain_network(width);
        let tpg = TpgNetwork::build(&net).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                let mut fdb = FaultDb::extract(&tpg);
                let mut rtpg = Rtpg::new(1);
                rtpg.run_plain(&tpg, &mut fdb, 256);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ppsfp);
criterion_main!(benches);
