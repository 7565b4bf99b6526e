//! Handlers every picmd device can expose for link bring-up.

use picmd_dispatch::{HandlerContext, HandlerRegister, HandlerResult, Reply, Result};

/// Replies with no data.
pub const PING: u8 = 0x00;
/// Replies with the request payload.
pub const ECHO: u8 = 0x01;
/// Replies with the crate version string.
pub const VERSION: u8 = 0x02;
/// Replies with the XOR of the payload bytes as an integer.
pub const CHECKSUM: u8 = 0x03;

/// A register holding all diagnostic handlers.
pub fn register() -> Result<HandlerRegister> {
    let mut register = HandlerRegister::new();
    register.register(PING.into(), ping)?;
    register.register(ECHO.into(), echo)?;
    register.register(VERSION.into(), version)?;
    register.register(CHECKSUM.into(), checksum)?;
    Ok(register)
}

fn ping(_: &HandlerContext<'_>) -> HandlerResult {
    Ok(Reply::Empty)
}

fn echo(ctx: &HandlerContext<'_>) -> HandlerResult {
    Ok(Reply::Bytes(ctx.payload_bytes()))
}

fn version(_: &HandlerContext<'_>) -> HandlerResult {
    Ok(env!("CARGO_PKG_VERSION").into())
}

fn checksum(ctx: &HandlerContext<'_>) -> HandlerResult {
    Ok(ctx.payload().iter().fold(0u8, |acc, byte| acc ^ byte).into())
}
