use criterion::{black_box, criterion_group, criterion_main, Criterion};

use wwvb_ntp::core::Stratum;
use wwvb_ntp::protocol::{NtpTimestamp, ReplyPacket, Request, PACKET_SIZE};
use wwvb_ntp::time::{ClockInstant, ClockModel, ManualTimeBase};

fn bench_clock(c: &mut Criterion) {
    c.bench_function("epoch_round_trip", |b| {
        b.iter(|| {
            let instant = ClockInstant::from_epoch_seconds(black_box(2_000_000_000));
            black_box(instant.epoch_seconds())
        })
    });

    c.bench_function("tick_one_day", |b| {
        b.iter(|| {
            let mut clock = ClockModel::with_time_base(ManualTimeBase::new());
            clock.set_instant(2024, 12, 31, 0, 0, 0);
            for _ in 0..86_400 {
                clock.tick(black_box(1000));
            }
            black_box(clock.get_utc())
        })
    });

    c.bench_function("local_offset", |b| {
        let utc = ClockInstant::new(2025, 1, 1, 2, 0, 0);
        b.iter(|| black_box(utc.add_hours(black_box(-5))))
    });
}

fn bench_reply(c: &mut Criterion) {
    let mut raw = [0u8; PACKET_SIZE];
    raw[0] = 0x23;

    c.bench_function("build_reply", |b| {
        b.iter(|| {
            let request = Request::parse(black_box(&raw)).unwrap();
            let receive = NtpTimestamp::from_unix(1_735_689_600, 500);
            let reply = ReplyPacket::for_request(&request, Stratum::primary(), "WWVB".into(), receive);
            black_box(reply.to_bytes())
        })
    });
}

criterion_group!(benches, bench_clock, bench_reply);
criterion_main!(benches);
