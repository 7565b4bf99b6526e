//! Decode command frames from an async byte stream with `CommandCodec`.
//!
//! Run with:
//!   cargo run -p picmd --example async-decode --features async

use futures_util::StreamExt;
use picmd::frame::CommandCodec;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::FramedRead;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (mut host, device) = tokio::io::duplex(64);

    tokio::spawn(async move {
        // Line noise, then two frames split across writes.
        let _ = host.write_all(b"\x00noise").await;
        let _ = host.write_all(b"AT*PIC=\x01\x01\x00\x02").await;
        let _ = host.write_all(b"\x02\r\nAT*PIC=\x04\x00\x00\x04\r\n").await;
    });

    let mut frames = FramedRead::new(device, CommandCodec::default());
    while let Some(item) = frames.next().await {
        match item? {
            Ok(command) => println!(
                "command id={:#04x} size={} parity_ok={}",
                command.id,
                command.size,
                command.parity_ok()
            ),
            Err(err) => eprintln!("skipped malformed frame: {err}"),
        }
    }
    Ok(())
}
