//! 反馈循环演示 - 每帧读取上一帧的结果并做指数衰减累加
//!
//! 读端与写端在两个线程中运行，通过同名 time buffer 交换数据。
//!
//! 使用方法:
//! ```bash
//! RUST_LOG=timebuffer_core=debug cargo run --example feedback
//! ```

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use timebuffer_core::{
    ChannelLayout, Descriptor, OrderingPolicy, Payload, Precision, ReaderConfig, ReaderEndpoint,
    Rect, Registry, RenderScale, WriterConfig, WriterEndpoint,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const WIDTH: i32 = 8;
const FRAMES: i64 = 12;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = Registry::new();
    let config = ReaderConfig::new("decay")
        .with_policy(OrderingPolicy::Black)
        .with_timeout_ms(1000);
    let reader = ReaderEndpoint::new(Arc::clone(&registry), "demo", config)?;
    let writer = WriterEndpoint::new(Arc::clone(&registry), "demo", WriterConfig::new("decay"))?;
    tracing::info!(key = %reader.key(), "channel bound");

    let scale = RenderScale::IDENTITY;
    let desc = Descriptor::new(Rect::new(0, 0, WIDTH, 1), ChannelLayout::Alpha, Precision::UInt8);
    let (tx, rx) = mpsc::channel::<(i64, Payload)>();

    // 写端线程：把渲染结果发布给下一帧
    let publisher = thread::spawn(move || -> timebuffer_core::Result<()> {
        for (frame, payload) in rx {
            writer.publish(frame, payload, scale)?;
        }
        Ok(())
    });

    for frame in 1..=FRAMES {
        let previous = reader.acquire(frame, scale, None)?;
        let input = (frame as u8).wrapping_mul(20);
        let pixels: Vec<u8> = (0..WIDTH as usize)
            .map(|i| {
                let old = previous.data().get(i).copied().unwrap_or(0) as u16;
                ((old + input as u16) / 2) as u8
            })
            .collect();
        println!("frame {:>2}: {:?}", frame, pixels);
        tx.send((frame, Payload::new(desc, pixels)?))?;
    }
    drop(tx);

    publisher
        .join()
        .map_err(|_| "publisher thread panicked")??;
    Ok(())
}
