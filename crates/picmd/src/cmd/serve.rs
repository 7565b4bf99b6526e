use std::io::{self, Read, Write};
use std::path::Path;

use picmd::diagnostics;
use picmd_dispatch::{
    Dispatcher, Runner, RunnerConfig, RunnerStats, StopHandle, UnknownCommandPolicy,
};
use picmd_transport::{
    SerialConfig, SerialTransport, ShutdownHook, StreamTransport, Transport,
};
use tracing::info;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{
    dispatch_error, transport_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS,
};
use crate::output::{print_stats, OutputFormat};

/// Device path that selects stdin/stdout instead of a serial port.
const STDIO_DEVICE: &str = "-";

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut dispatcher = Dispatcher::new();
    let handlers =
        diagnostics::register().map_err(|err| dispatch_error("handler setup failed", err))?;
    dispatcher
        .import_register(&handlers)
        .map_err(|err| dispatch_error("handler setup failed", err))?;

    let config = RunnerConfig {
        frame: args.link.frame_config(),
        on_unknown_command: if args.reply_unknown {
            UnknownCommandPolicy::Reply
        } else {
            UnknownCommandPolicy::Propagate
        },
        ..RunnerConfig::default()
    };

    if args.link.device == Path::new(STDIO_DEVICE) {
        // stdout carries replies; nothing else may be printed there. A read
        // on stdin cannot be interrupted, so stopping ends the process.
        // Every reply has already been flushed by then.
        let transport = StreamTransport::new(Stdio).with_shutdown(ShutdownHook::new(|| {
            info!("interrupted while waiting on stdin");
            std::process::exit(INTERRUPTED)
        }));
        serve_on(transport, dispatcher, config)?;
        return Ok(SUCCESS);
    }

    let serial = SerialConfig {
        path: args.link.device.clone(),
        baud_rate: args.link.baud,
        read_timeout: parse_duration(&args.read_timeout)?,
    };
    let transport =
        SerialTransport::open(&serial).map_err(|err| transport_error("open failed", err))?;
    let stats = serve_on(transport, dispatcher, config)?;
    print_stats(&stats, format);
    Ok(SUCCESS)
}

fn serve_on<T: Transport>(
    transport: T,
    dispatcher: Dispatcher,
    config: RunnerConfig,
) -> CliResult<RunnerStats> {
    let mut runner = Runner::with_config(transport, dispatcher, config);
    install_ctrlc_handler(runner.stop_handle())?;
    let stats = runner
        .run()
        .map_err(|err| dispatch_error("serve failed", err))?;
    info!(
        frames = stats.frames,
        format_errors = stats.format_errors,
        length_errors = stats.length_errors,
        parity_failures = stats.parity_failures,
        "serve finished"
    );
    Ok(stats)
}

fn install_ctrlc_handler(stop: StopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Process stdin and stdout as one link.
struct Stdio;

impl Read for Stdio {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().lock().read(buf)
    }
}

impl Write for Stdio {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}
