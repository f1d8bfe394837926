use std::sync::Arc;
use std::time::Duration;

use balancer_core::protocol::codec;
use balancer_core::protocol::rx::{RxBuffer, RxEngine};
use balancer_core::protocol::{Command, Telemetry};
use balancer_core::{BalanceLoop, LoopCfg};
use balancer_hardware::{SimulatedEncoder, SimulatedImu, SimulatedMotor};
use balancer_traits::clock::test_clock::TestClock;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

fn tuned_command() -> Command {
    let mut cmd = Command {
        control_state: true,
        pos_setpoint_mm: 50.0,
        ..Command::default()
    };
    let var = &mut cmd.parameters.variable;
    var.general.r_stop = 20;
    var.general.r_start = 40;
    var.balance.k1 = -0.5;
    var.balance.k2 = -30.0;
    var.balance.k3 = -3.0;
    var.position.k4 = -0.2;
    var.position.ki = -0.05;
    var.position.kr = 0.2;
    let inf = &mut cmd.parameters.inferred;
    for i in 0..4 {
        inf.observer.phi[i][i] = 1.0;
        inf.feedforward.phi[i][i] = 1.0;
    }
    inf.observer.inno_gain = [[0.5, 0.0, 0.0], [0.1, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 0.0, 0.5]];
    inf.observer.gamma = [0.0, 0.01, 0.0, -0.02];
    inf.feedforward.gamma = [0.0, 0.01, 0.0, -0.02];
    cmd
}

fn sample_size(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // BENCH_SAMPLE_SIZE=10 cargo bench -p balancer_core --bench cycle
    if let Ok(n) = std::env::var("BENCH_SAMPLE_SIZE").map(|s| s.parse::<usize>()) {
        g.sample_size(n.unwrap_or(50).max(10));
    } else {
        g.sample_size(50);
    }
}

pub fn bench_control_cycle(c: &mut Criterion) {
    let mut g = c.benchmark_group("control_cycle");
    sample_size(&mut g);
    let clock = TestClock::new();
    let mut balance = BalanceLoop::new(
        SimulatedEncoder::new(),
        SimulatedImu::upright(),
        SimulatedMotor::new(),
        &LoopCfg::default(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    let cmd = tuned_command();
    let mut telemetry = Telemetry::default();
    g.bench_function("cycle", |b| {
        b.iter(|| {
            clock.advance(Duration::from_millis(10));
            black_box(balance.cycle(black_box(&cmd), &mut telemetry).unwrap());
        })
    });
    g.finish();
}

pub fn bench_receive_scan(c: &mut Criterion) {
    let mut g = c.benchmark_group("receive_scan");
    sample_size(&mut g);
    let frame = codec::encode_to_vec(&tuned_command()).unwrap();
    g.bench_function("full_command_frame", |b| {
        b.iter_batched(
            || {
                let mut buf = RxBuffer::with_capacity(1500);
                buf.extend_from_slice(&frame);
                (buf, RxEngine::new())
            },
            |(mut buf, mut engine)| {
                let scan = engine.scan(&mut buf, |_| {});
                if let balancer_core::protocol::rx::Scan::Complete(range) = scan {
                    black_box(codec::decode::<Command>(buf.payload(range)).unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

criterion_group!(benches, bench_control_cycle, bench_receive_scan);
criterion_main!(benches);
