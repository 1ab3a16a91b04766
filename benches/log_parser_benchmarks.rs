use airplay_supervisor::protocol::resp::{RespCodec, RespValue};
use airplay_supervisor::receiver::parse_line;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn log_parser_benchmark(c: &mut Criterion) {
    // Mostly noise, as the receiver really produces
    let lines = [
        "raop_ntp: timing thread started",
        "Connection from 192.168.1.20 (Living Room iPad)",
        "Client connected: Living Room iPad",
        "Starting video stream",
        "h264 decoder: width=1920 height=1080",
        "raop_rtp_mirror: received 4096 bytes",
        "Connection closed",
    ];

    c.bench_function("parse_line_mixed", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(parse_line(black_box(line)));
            }
        })
    });

    c.bench_function("parse_line_noise", |b| {
        b.iter(|| parse_line(black_box("raop_rtp_mirror: received 4096 bytes")))
    });
}

fn resp_benchmark(c: &mut Criterion) {
    let message = RespValue::Array(vec![
        RespValue::bulk("message"),
        RespValue::bulk("airplay_cmd"),
        RespValue::bulk("restart"),
    ])
    .encode();

    c.bench_function("resp_decode_pubsub_message", |b| {
        b.iter(|| {
            let mut codec = RespCodec::new();
            codec.feed(black_box(&message)).unwrap();
            codec.decode().unwrap()
        })
    });
}

criterion_group!(benches, log_parser_benchmark, resp_benchmark);
criterion_main!(benches);
