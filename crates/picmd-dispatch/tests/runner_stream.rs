#![cfg(unix)]

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use picmd_dispatch::{Dispatcher, HandlerContext, HandlerResult, Reply, Runner};
use picmd_transport::StreamTransport;

fn echo_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register(0x01, |ctx: &HandlerContext<'_>| -> HandlerResult {
            Ok(Reply::Bytes(ctx.payload_bytes()))
        })
        .expect("handler should register");
    dispatcher
}

#[test]
fn stop_returns_while_read_is_blocked() {
    let (device, _host) = UnixStream::pair().expect("socket pair should open");
    let transport = StreamTransport::unix(device).expect("socket should clone");
    let mut runner = Runner::new(transport, echo_dispatcher());
    let stop = runner.stop_handle();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(runner.run().map_err(|err| err.to_string()));
    });

    // Host stays connected and silent: the runner sits in a blocking read.
    thread::sleep(Duration::from_millis(100));
    stop.stop();

    let stats = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("runner should return after stop")
        .expect("stop should be a clean exit");
    assert_eq!(stats.frames, 0);
}

#[test]
fn serves_over_socket_then_stops() {
    let (device, mut host) = UnixStream::pair().expect("socket pair should open");
    let transport = StreamTransport::unix(device).expect("socket should clone");
    let mut runner = Runner::new(transport, echo_dispatcher());
    let stop = runner.stop_handle();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(runner.run().map_err(|err| err.to_string()));
    });

    host.write_all(b"AT*PIC=\x01\x01\x00z\x7a\r\n")
        .expect("request should be written");
    host.set_read_timeout(Some(Duration::from_secs(2)))
        .expect("timeout should be set");
    let expected = b"*PIC:\x01\x01\x00z\x7a\r\nOK\r\n";
    let mut reply = vec![0u8; expected.len()];
    host.read_exact(&mut reply).expect("reply should arrive");
    assert_eq!(reply, expected);

    stop.stop();
    let stats = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("runner should return after stop")
        .expect("stop should be a clean exit");
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.replies, 1);
}
