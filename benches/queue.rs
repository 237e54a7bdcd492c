//! Benchmarks for the producer hot path: queueing and event rendering.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use jeff_agent::{
    AgentEvent, MessageFormat, SenderConfig, TcpSender,
    sender::{OutboundMessage, OutboundQueue},
};

fn queue_push_pop(c: &mut Criterion) {
    let queue = OutboundQueue::new(1024);
    c.bench_function("queue_push_pop", |b| {
        b.iter(|| {
            let _ = queue.push(OutboundMessage::new(black_box("ThreadStart: worker-1\n")));
            black_box(queue.pop());
        })
    });
}

fn sender_send_idle(c: &mut Criterion) {
    c.bench_function("sender_send_idle", |b| {
        b.iter_batched(
            || TcpSender::with_config(SenderConfig::default().with_address("127.0.0.1", "9")),
            |sender| {
                for n in 0..256 {
                    black_box(sender.send(format!("message {n}")));
                }
                sender
            },
            BatchSize::SmallInput,
        )
    });
}

fn render_events(c: &mut Criterion) {
    let event = AgentEvent::MethodExit {
        method: "com.example.Main.run".into(),
        popped_by_exception: false,
    };
    c.bench_function("render_text", |b| {
        b.iter(|| black_box(MessageFormat::Text.render(black_box(&event))))
    });
    c.bench_function("render_json", |b| {
        b.iter(|| black_box(MessageFormat::Json.render(black_box(&event))))
    });
}

criterion_group!(benches, queue_push_pop, sender_send_idle, render_events);
criterion_main!(benches);
