use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use streamsub_frame::Packing;
use streamsub_listener::{DeliveryQueue, Listener, ListenerConfig, OverflowPolicy};
use streamsub_transport::Endpoint;

use crate::cmd::{parse_duration, ListenArgs};
use crate::config::{build_shape, StreamFile};
use crate::exit::{listener_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, OutputFormat};

const DEFAULT_CAPACITY: usize = 1024;
const CONSUMER_WAIT: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let file = match &args.config {
        Some(path) => StreamFile::load(path)?,
        None => StreamFile::default(),
    };
    let (config, capacity) = resolve(&args, file)?;

    let queue = DeliveryQueue::new(capacity).map_err(|err| listener_error("invalid queue", err))?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let listener = Listener::builder(config)
        .queue(queue.clone())
        .log_sink(|line| tracing::info!("{line}"))
        .spawn()
        .map_err(|err| listener_error("listener failed to start", err))?;

    let mut printed = 0u64;
    let limit_reached = |printed: u64| args.count.is_some_and(|count| printed >= count);

    'consume: while running.load(Ordering::SeqCst) && !limit_reached(printed) {
        if let Some(record) = queue.pop_timeout(CONSUMER_WAIT) {
            printed += 1;
            print_record(&record, printed, format);
            continue;
        }
        if listener.is_finished() {
            for record in queue.drain() {
                if limit_reached(printed) {
                    break 'consume;
                }
                printed += 1;
                print_record(&record, printed, format);
            }
            break;
        }
    }

    listener
        .stop()
        .map_err(|err| listener_error("listener stopped", err))?;
    tracing::debug!(printed, stats = ?listener.stats(), "listen finished");
    Ok(SUCCESS)
}

/// Merge flags over the settings file into a listener configuration.
fn resolve(args: &ListenArgs, file: StreamFile) -> CliResult<(ListenerConfig, usize)> {
    let endpoint = args
        .endpoint
        .clone()
        .or(file.endpoint)
        .ok_or_else(|| CliError::usage("an endpoint is required (argument or config file)"))?;
    let endpoint: Endpoint = endpoint
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))?;

    let packing = if args.shape.packed {
        Packing::Packed
    } else {
        file.packing
    };
    let layout = args.shape.layout.as_deref().or(file.layout.as_deref());
    let shape = build_shape(layout, packing, args.shape.width.or(file.width))?;

    let mut config = ListenerConfig::new(endpoint, shape)
        .with_retry(args.retry || file.retry.unwrap_or(false));
    if let Some(name) = args.name.clone().or(file.name) {
        config = config.with_name(name);
    }
    if args.drop_oldest {
        config = config.with_overflow(OverflowPolicy::DropOldest);
    } else if let Some(overflow) = file.overflow {
        config = config.with_overflow(overflow);
    }
    if let Some(timeout) = &args.poll_timeout {
        config = config.with_poll_timeout(parse_duration(timeout)?);
    } else if let Some(millis) = file.poll_timeout_ms {
        config = config.with_poll_timeout(Duration::from_millis(millis));
    }
    if let Some(max_frame_size) = file.max_frame_size {
        config = config.with_max_frame_size(max_frame_size);
    }
    config
        .validate()
        .map_err(|err| listener_error("invalid configuration", err))?;

    let capacity = args.capacity.or(file.capacity).unwrap_or(DEFAULT_CAPACITY);
    Ok((config, capacity))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
