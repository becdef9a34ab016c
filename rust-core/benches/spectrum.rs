use criterion::{black_box, criterion_group, criterion_main, Criterion};
use signal_lab::audio::gain::SharedScale;
use signal_lab::audio::SignalChain;
use signal_lab::filters::EqGains;
use signal_lab::spectrum::AnalyzerConfig;
use signal_lab::{PipelineConfig, SpectrumAnalyzer};
use std::f64::consts::PI;
use std::sync::Arc;

fn bench_analyze(c: &mut Criterion) {
    let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();
    let frame: Vec<f64> = (0..960)
        .map(|i| (2.0 * PI * 1000.0 * i as f64 / 48000.0).sin())
        .collect();
    let mut spectrum = Vec::new();

    c.bench_function("analyze_960_into_1024", |b| {
        b.iter(|| analyzer.analyze_into(black_box(&frame), &mut spectrum))
    });
}

fn bench_signal_chain(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let mut chain = SignalChain::new(
        &config,
        Arc::new(EqGains::default()),
        Arc::new(SharedScale::default()),
    )
    .unwrap();
    let mut frame: Vec<i16> = (0..config.frame_len())
        .map(|i| ((i as f64 * 0.05).sin() * 8000.0) as i16)
        .collect();

    c.bench_function("signal_chain_stereo_frame", |b| {
        b.iter(|| chain.process_inplace(black_box(&mut frame)))
    });
}

criterion_group!(benches, bench_analyze, bench_signal_chain);
criterion_main!(benches);
