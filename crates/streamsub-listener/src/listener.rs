use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use streamsub_frame::{Reassembler, Record};
use streamsub_transport::{Connector, Endpoint, SubscriberSocket, TcpConnector};
use tracing::{debug, info, info_span, warn};

use crate::config::ListenerConfig;
use crate::delivery::{passthrough, Delivery, LogSink, NotifyFn, Transform};
use crate::error::{BoxError, ListenerError, Result};
use crate::queue::DeliveryQueue;
use crate::status::{ListenerState, ListenerStats, Shared};

/// Configures and starts a [`Listener`].
pub struct ListenerBuilder<T> {
    pub(crate) config: ListenerConfig,
    pub(crate) queue: Option<DeliveryQueue<T>>,
    pub(crate) transform: Transform<T>,
    pub(crate) notify: Option<NotifyFn>,
    pub(crate) log_sink: Option<LogSink>,
    /// `None` connects over TCP.
    pub(crate) connector: Option<Arc<dyn Connector>>,
}

impl<T: Send + 'static> ListenerBuilder<T> {
    /// Queue that receives delivered items.
    ///
    /// Without one, transform results are dropped after the transform runs.
    pub fn queue(mut self, queue: DeliveryQueue<T>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Per-record transform, run on the listener thread.
    ///
    /// Changes the item type, so any queue set earlier is discarded; set the
    /// queue after the transform.
    pub fn transform<U, F>(self, transform: F) -> ListenerBuilder<U>
    where
        F: FnMut(Record) -> std::result::Result<Option<U>, BoxError> + Send + 'static,
    {
        ListenerBuilder {
            config: self.config,
            queue: None,
            transform: Box::new(transform),
            notify: self.notify,
            log_sink: self.log_sink,
            connector: self.connector,
        }
    }

    /// Error callback, see [`ListenerConfig::retry`].
    pub fn notify(mut self, notify: impl Fn(&ListenerError) + Send + Sync + 'static) -> Self {
        self.notify = Some(Arc::new(notify));
        self
    }

    /// Receiver for connection log lines.
    pub fn log_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log_sink = Some(Arc::new(sink));
        self
    }

    /// Replace the TCP connector, e.g. with a test double.
    ///
    /// Only the thread-backed [`Listener`] can use a custom connector.
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Validate the configuration and start the worker thread.
    pub fn spawn(self) -> Result<Listener<T>> {
        self.config.validate()?;

        let shared = Arc::new(Shared::default());
        let name = self.config.name.clone();
        let endpoint = self.config.endpoint.clone();
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(TcpConnector::default()),
        };
        let worker = Worker {
            delivery: Delivery::new(self.transform, self.queue.clone(), self.config.overflow),
            config: self.config,
            connector,
            notify: self.notify,
            log_sink: self.log_sink,
            shared: Arc::clone(&shared),
        };

        let span_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let span = info_span!("listener", name = %span_name);
                let _entered = span.enter();
                worker.run()
            })
            .map_err(ListenerError::Spawn)?;

        Ok(Listener {
            name,
            endpoint,
            shared,
            handle: Mutex::new(Some(handle)),
            queue: self.queue,
        })
    }
}

/// Handle to a running broadcast subscription.
///
/// The subscription runs on its own thread until [`stop`](Self::stop) is called,
/// the handle is dropped, or an error ends it (see [`ListenerConfig::retry`]).
pub struct Listener<T = Record> {
    name: String,
    endpoint: Endpoint,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<Result<()>>>>,
    queue: Option<DeliveryQueue<T>>,
}

impl Listener<Record> {
    /// Start building a listener that delivers raw records.
    pub fn builder(config: ListenerConfig) -> ListenerBuilder<Record> {
        ListenerBuilder {
            config,
            queue: None,
            transform: passthrough(),
            notify: None,
            log_sink: None,
            connector: None,
        }
    }
}

impl<T> Listener<T> {
    /// Request stop and wait for the worker thread to exit.
    ///
    /// The first call to `stop` or [`join`](Self::join) returns the worker's
    /// outcome; later calls return `Ok(())`. No item is enqueued after this
    /// returns.
    pub fn stop(&self) -> Result<()> {
        self.shared.request_stop();
        self.wait()
    }

    /// Wait for the worker to exit on its own, without requesting stop.
    pub fn join(&self) -> Result<()> {
        self.wait()
    }

    fn wait(&self) -> Result<()> {
        let mut slot = self.handle.lock();
        let Some(handle) = slot.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ListenerError::Panicked(message))
            }
        }
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        match self.handle.try_lock() {
            Some(slot) => slot.as_ref().map_or(true, JoinHandle::is_finished),
            None => false,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.shared.state()
    }

    pub fn stats(&self) -> ListenerStats {
        self.shared.counters.snapshot()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The delivery queue, if one was configured.
    pub fn queue(&self) -> Option<&DeliveryQueue<T>> {
        self.queue.as_ref()
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            debug!(name = %self.name, error = %err, "listener ended with error");
        }
    }
}

impl<T> std::fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct Worker<T> {
    config: ListenerConfig,
    connector: Arc<dyn Connector>,
    delivery: Delivery<T>,
    notify: Option<NotifyFn>,
    log_sink: Option<LogSink>,
    shared: Arc<Shared>,
}

impl<T> Worker<T> {
    fn run(mut self) -> Result<()> {
        let outcome = self.run_loop();
        self.shared.set_state(ListenerState::Terminated);
        debug!(ok = outcome.is_ok(), "listener terminated");
        outcome
    }

    fn run_loop(&mut self) -> Result<()> {
        while !self.shared.stop.is_set() {
            self.shared.set_state(ListenerState::Connecting);
            let socket = match self.connector.connect(&self.config.endpoint) {
                Ok(socket) => socket,
                Err(err) => {
                    self.shared.set_state(ListenerState::Disconnected);
                    self.log(&format!(
                        "Attempt to connect to {} by {} failed.",
                        self.config.endpoint, self.config.name
                    ));
                    let outcome = self.fail(err.into());
                    let stopped = self.shared.stop.wait_timeout(self.config.retry_backoff);
                    outcome?;
                    if stopped {
                        break;
                    }
                    continue;
                }
            };

            if let Err(err) = self.session(socket) {
                self.shared.set_state(ListenerState::Disconnected);
                if self.shared.stop.is_set() {
                    debug!(error = %err, "connection closed by stop request");
                    break;
                }
                self.log(&format!(
                    "Communication from {} to {} disconnected: {err}.",
                    self.config.name, self.config.endpoint
                ));
                self.fail(err)?;
            }
        }
        Ok(())
    }

    /// Run one connection until stop or an error. The socket and every
    /// buffered byte are dropped on return.
    fn session(&mut self, mut socket: Box<dyn SubscriberSocket>) -> Result<()> {
        self.shared.attach(socket.closer()?);
        let result = self.pump(socket.as_mut());
        self.shared.detach();
        result
    }

    fn pump(&mut self, socket: &mut dyn SubscriberSocket) -> Result<()> {
        let mut reassembler = Reassembler::new(self.config.shape.clone())
            .with_max_frame(self.config.max_frame_size);

        self.shared.counters.connected();
        self.shared.set_state(ListenerState::Connected);
        info!(endpoint = %self.config.endpoint, "connection established");
        self.log(&format!(
            "Connection made by {} to {}.",
            self.config.name, self.config.endpoint
        ));

        while !self.shared.stop.is_set() {
            self.shared.set_state(ListenerState::Polling);
            let Some(chunk) = socket.recv_timeout(self.config.poll_timeout)? else {
                continue;
            };

            self.shared.set_state(ListenerState::Reassembling);
            reassembler.extend(&chunk);
            while let Some(record) = reassembler.next_record()? {
                if self.shared.stop.is_set() {
                    return Ok(());
                }
                self.delivery.deliver(record, &self.shared.counters)?;
            }
        }
        Ok(())
    }

    /// Apply the notify/retry policy to an error. `Ok` means keep running.
    fn fail(&self, err: ListenerError) -> Result<()> {
        if self.shared.stop.is_set() {
            debug!(error = %err, "error after stop request ignored");
            return Ok(());
        }

        self.shared.counters.error();
        warn!(error = %err, retry = self.config.retry, "listener error");
        if let Some(notify) = &self.notify {
            notify(&err);
        }
        if self.config.retry {
            Ok(())
        } else {
            Err(err)
        }
    }

    fn log(&self, line: &str) {
        if let Some(sink) = &self.log_sink {
            sink(line);
        }
    }
}
