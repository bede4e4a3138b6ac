use streamsub_frame::{Packing, Reassembler};

use crate::cmd::DecodeArgs;
use crate::config::build_shape;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::usage("chunk size must be greater than zero"));
    }

    let packing = if args.shape.packed {
        Packing::Packed
    } else {
        Packing::Native
    };
    let shape = build_shape(args.shape.layout.as_deref(), packing, args.shape.width)?;
    let bytes = std::fs::read(&args.file)
        .map_err(|err| io_error(&format!("read {}", args.file.display()), err))?;

    let mut reassembler = Reassembler::new(shape);
    if let Some(max_frame_size) = args.max_frame_size {
        reassembler = reassembler.with_max_frame(max_frame_size);
    }

    let mut decoded = 0u64;
    for (index, chunk) in bytes.chunks(args.chunk_size).enumerate() {
        reassembler.extend(chunk);
        loop {
            match reassembler.next_record() {
                Ok(Some(record)) => {
                    decoded += 1;
                    print_record(&record, decoded, format);
                }
                Ok(None) => break,
                Err(err) => {
                    let offset = index * args.chunk_size;
                    return Err(frame_error(
                        &format!("stream corrupt after {decoded} records (chunk at byte {offset})"),
                        err,
                    ));
                }
            }
        }
    }

    if reassembler.buffered() > 0 {
        tracing::warn!(
            bytes = reassembler.buffered(),
            "capture ends with an incomplete record"
        );
    }
    tracing::debug!(decoded, file = %args.file.display(), "decode finished");
    Ok(SUCCESS)
}
