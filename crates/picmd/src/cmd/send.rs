use picmd_frame::{CommandClient, NO_ERROR};
use picmd_transport::{SerialConfig, SerialTransport, DEFAULT_READ_TIMEOUT};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, transport_error, CliResult, COMMAND_FAILED, SUCCESS};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.payload()?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    let serial = SerialConfig {
        path: args.link.device.clone(),
        baud_rate: args.link.baud,
        read_timeout: DEFAULT_READ_TIMEOUT,
    };
    let transport =
        SerialTransport::open(&serial).map_err(|err| transport_error("open failed", err))?;

    let mut client = CommandClient::with_config(transport, args.link.frame_config())
        .with_reply_timeout(wait_timeout);
    let reply = client
        .request(args.payload.id, &payload)
        .map_err(|err| frame_error("request failed", err))?;

    print_reply(&reply, format);
    Ok(if reply.status == NO_ERROR {
        SUCCESS
    } else {
        COMMAND_FAILED
    })
}
