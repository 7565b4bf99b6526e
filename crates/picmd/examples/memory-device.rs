//! Serve the diagnostic handlers over an in-memory link and print the replies.
//!
//! Run with:
//!   cargo run -p picmd --example memory-device

use bytes::BytesMut;
use picmd::diagnostics;
use picmd::dispatch::{Dispatcher, Runner};
use picmd::frame::{decode_reply, encode_command, FieldEncoding};
use picmd::transport::MemoryTransport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut dispatcher = Dispatcher::new();
    dispatcher.import_register(&diagnostics::register()?)?;

    let mut input = BytesMut::new();
    encode_command(diagnostics::PING, b"", FieldEncoding::Binary, &mut input)?;
    encode_command(diagnostics::ECHO, b"hello", FieldEncoding::Binary, &mut input)?;
    encode_command(diagnostics::VERSION, b"", FieldEncoding::Binary, &mut input)?;
    // Corrupt parity: answered with INVALID_PARITY_ERROR.
    input.extend_from_slice(b"AT*PIC=\x03\x01\x00\x7f\x00\r\n");

    let (transport, handle) = MemoryTransport::scripted([input.freeze()]);
    let stats = Runner::new(transport, dispatcher).run()?;
    eprintln!("served {} frames", stats.frames);

    let mut written = BytesMut::from(&handle.written()[..]);
    while let Some(reply) = decode_reply(&mut written, FieldEncoding::Binary)? {
        println!(
            "id={:#04x} status={} data={}",
            reply.id,
            reply.status,
            reply.data.escape_ascii()
        );
    }
    Ok(())
}
