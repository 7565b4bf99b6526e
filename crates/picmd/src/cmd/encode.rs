use bytes::BytesMut;
use picmd_frame::encode_command;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.payload.payload()?;
    let encoding = args.encoding.into();

    let mut frame = BytesMut::new();
    encode_command(args.payload.id, &payload, encoding, &mut frame)
        .map_err(|err| frame_error("encode failed", err))?;

    print_frame(args.payload.id, payload.len(), encoding, &frame, format);
    Ok(SUCCESS)
}
