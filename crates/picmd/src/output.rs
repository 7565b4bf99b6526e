use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use picmd_dispatch::RunnerStats;
use picmd_frame::status::status_name;
use picmd_frame::{FieldEncoding, ReplyFrame};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    id: u8,
    status: u8,
    status_name: &'a str,
    size: usize,
    data_hex: String,
    data_text: Option<&'a str>,
    checksum: u8,
}

pub fn print_reply(reply: &ReplyFrame, format: OutputFormat) {
    let data_text = std::str::from_utf8(&reply.data).ok();
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                id: reply.id,
                status: reply.status,
                status_name: status_name(reply.status),
                size: reply.data.len(),
                data_hex: hex::encode(&reply.data),
                data_text,
                checksum: reply.checksum,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "STATUS", "SIZE", "DATA"])
                .add_row(vec![
                    format!("{:#04x}", reply.id),
                    format!("{} ({})", reply.status, status_name(reply.status)),
                    reply.data.len().to_string(),
                    data_preview(&reply.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "id={:#04x} status={} ({}) size={} data={}",
                reply.id,
                reply.status,
                status_name(reply.status),
                reply.data.len(),
                data_preview(&reply.data)
            );
        }
        OutputFormat::Raw => print_raw(&reply.data),
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    id: u8,
    size: usize,
    encoding: &'a str,
    frame_hex: String,
}

pub fn print_frame(id: u8, size: usize, encoding: FieldEncoding, frame: &[u8], format: OutputFormat) {
    let encoding = encoding_name(encoding);
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            id,
            size,
            encoding,
            frame_hex: hex::encode(frame),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "SIZE", "ENCODING", "FRAME"])
                .add_row(vec![
                    format!("{id:#04x}"),
                    size.to_string(),
                    encoding.to_string(),
                    hex::encode(frame),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", frame.escape_ascii());
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

#[derive(Serialize)]
struct StatsOutput {
    frames: u64,
    replies: u64,
    format_errors: u64,
    length_errors: u64,
    parity_failures: u64,
    overflows: u64,
}

pub fn print_stats(stats: &RunnerStats, format: OutputFormat) {
    let out = StatsOutput {
        frames: stats.frames,
        replies: stats.replies,
        format_errors: stats.format_errors,
        length_errors: stats.length_errors,
        parity_failures: stats.parity_failures,
        overflows: stats.overflows,
    };
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("frames", out.frames),
                ("replies", out.replies),
                ("format_errors", out.format_errors),
                ("length_errors", out.length_errors),
                ("parity_failures", out.parity_failures),
                ("overflows", out.overflows),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frames={} replies={} format_errors={} length_errors={} parity_failures={} overflows={}",
                out.frames,
                out.replies,
                out.format_errors,
                out.length_errors,
                out.parity_failures,
                out.overflows
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn encoding_name(encoding: FieldEncoding) -> &'static str {
    match encoding {
        FieldEncoding::Binary => "binary",
        FieldEncoding::HexAscii => "hex",
    }
}

fn data_preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => hex::encode(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_prefers_printable_text() {
        assert_eq!(data_preview(b"0.1.0"), "0.1.0");
        assert_eq!(data_preview(b"\x01\x00"), "0100");
    }
}
