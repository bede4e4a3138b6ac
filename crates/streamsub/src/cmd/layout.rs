use streamsub_frame::{Packing, RecordLayout};

use crate::cmd::LayoutArgs;
use crate::exit::{layout_error, CliResult, SUCCESS};
use crate::output::{print_layout, OutputFormat};

pub fn run(args: LayoutArgs, format: OutputFormat) -> CliResult<i32> {
    let packing = if args.packed {
        Packing::Packed
    } else {
        Packing::Native
    };
    let mut layout = RecordLayout::parse_with(&args.spec, packing)
        .map_err(|err| layout_error("invalid layout", err))?;
    if let Some(width) = args.width {
        layout = layout
            .expect_width(width)
            .map_err(|err| layout_error("width check failed", err))?;
    }

    print_layout(&layout, format);
    Ok(SUCCESS)
}
