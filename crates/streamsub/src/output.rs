use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use streamsub_frame::{FieldSpec, Packing, Record, RecordLayout};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct RecordOutput<'a> {
    seq: u64,
    received_at: String,
    record: &'a Record,
}

pub fn print_record(record: &Record, seq: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                seq,
                received_at: now_unix_seconds(),
                record,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            match record {
                Record::Fixed(fixed) => {
                    let mut header = vec!["SEQ".to_string()];
                    let mut row = vec![seq.to_string()];
                    for (name, value) in fixed.iter() {
                        header.push(name.to_string());
                        row.push(scalar_text(value));
                    }
                    table.set_header(header).add_row(row);
                }
                Record::Object(value) => {
                    table
                        .set_header(vec!["SEQ", "RECORD"])
                        .add_row(vec![seq.to_string(), value.to_string()]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => match record {
            Record::Fixed(fixed) => {
                let fields: Vec<String> = fixed
                    .iter()
                    .map(|(name, value)| format!("{name}={}", scalar_text(value)))
                    .collect();
                println!("#{seq} {}", fields.join(" "));
            }
            Record::Object(value) => println!("#{seq} {value}"),
        },
    }
}

#[derive(Serialize)]
struct LayoutOutput<'a> {
    width: usize,
    packing: &'static str,
    fields: &'a [FieldSpec],
}

pub fn print_layout(layout: &RecordLayout, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = LayoutOutput {
                width: layout.width(),
                packing: packing_name(layout.packing()),
                fields: layout.fields(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "TYPE", "OFFSET", "SIZE"]);
            for field in layout.fields() {
                table.add_row(vec![
                    field.name.clone(),
                    field.ty.to_string(),
                    field.offset.to_string(),
                    field.ty.size().to_string(),
                ]);
            }
            table.add_row(vec![
                "(width)".to_string(),
                packing_name(layout.packing()).to_string(),
                String::new(),
                layout.width().to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for field in layout.fields() {
                println!(
                    "{:>6}  {:<4} {}",
                    field.offset,
                    field.ty.to_string(),
                    field.name
                );
            }
            println!(
                "width={} packing={}",
                layout.width(),
                packing_name(layout.packing())
            );
        }
    }
}

fn packing_name(packing: Packing) -> &'static str {
    match packing {
        Packing::Native => "native",
        Packing::Packed => "packed",
    }
}

fn scalar_text(value: &streamsub_frame::Scalar) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "?".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
