use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use streamsub_frame::{Record, RecordCodec};
use streamsub_transport::{connect_async, Endpoint, TransportError};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::config::ListenerConfig;
use crate::delivery::{Delivery, LogSink, NotifyFn};
use crate::error::{ListenerError, Result};
use crate::listener::ListenerBuilder;
use crate::queue::DeliveryQueue;
use crate::status::{ListenerState, ListenerStats, Shared};

/// A [`Listener`](crate::Listener) that runs as a tokio task.
///
/// Connects with tokio's TCP stream. A builder carrying a custom connector is
/// rejected.
pub struct AsyncListener<T = Record> {
    name: String,
    endpoint: Endpoint,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    task: Option<JoinHandle<Result<()>>>,
    queue: Option<DeliveryQueue<T>>,
}

impl<T: Send + 'static> AsyncListener<T> {
    /// Start the subscription on the current tokio runtime.
    pub fn spawn(builder: ListenerBuilder<T>) -> Result<Self> {
        builder.config.validate()?;
        if builder.connector.is_some() {
            return Err(ListenerError::Config(
                "custom connectors are not supported by the async listener".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| ListenerError::Spawn(std::io::Error::other(err)))?;

        let cancel = CancellationToken::new();
        let shared = Arc::new(Shared::default());
        let name = builder.config.name.clone();
        let endpoint = builder.config.endpoint.clone();
        let queue = builder.queue.clone();

        let worker = AsyncWorker {
            delivery: Delivery::new(builder.transform, builder.queue, builder.config.overflow),
            config: builder.config,
            notify: builder.notify,
            log_sink: builder.log_sink,
            cancel: cancel.clone(),
            shared: Arc::clone(&shared),
        };
        let span = tracing::info_span!("listener", name = %name);
        let task = runtime.spawn(worker.run().instrument(span));

        Ok(Self {
            name,
            endpoint,
            cancel,
            shared,
            task: Some(task),
            queue,
        })
    }
}

impl<T> AsyncListener<T> {
    /// Cancel the task and wait for it to finish.
    ///
    /// Returns the task's outcome the first time, `Ok(())` afterwards.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the task to end on its own.
    pub async fn join(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => Err(ListenerError::Panicked(err.to_string())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
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

    pub fn queue(&self) -> Option<&DeliveryQueue<T>> {
        self.queue.as_ref()
    }
}

impl<T> std::fmt::Debug for AsyncListener<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncListener")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for AsyncListener<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct AsyncWorker<T> {
    config: ListenerConfig,
    delivery: Delivery<T>,
    notify: Option<NotifyFn>,
    log_sink: Option<LogSink>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
}

impl<T> AsyncWorker<T> {
    async fn run(mut self) -> Result<()> {
        let outcome = self.run_loop().await;
        self.shared.set_state(ListenerState::Terminated);
        debug!(ok = outcome.is_ok(), "listener terminated");
        outcome
    }

    async fn run_loop(&mut self) -> Result<()> {
        while !self.cancel.is_cancelled() {
            self.shared.set_state(ListenerState::Connecting);
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                connected = connect_async(&self.config.endpoint) => connected,
            };

            let stream = match connected {
                Ok(stream) => stream,
                Err(err) => {
                    self.shared.set_state(ListenerState::Disconnected);
                    self.log(&format!(
                        "Attempt to connect to {} by {} failed.",
                        self.config.endpoint, self.config.name
                    ));
                    let outcome = self.fail(err.into());
                    let stopped = tokio::select! {
                        _ = self.cancel.cancelled() => true,
                        _ = tokio::time::sleep(self.config.retry_backoff) => false,
                    };
                    outcome?;
                    if stopped {
                        break;
                    }
                    continue;
                }
            };

            if let Err(err) = self.session(stream).await {
                self.shared.set_state(ListenerState::Disconnected);
                if self.cancel.is_cancelled() {
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

    async fn session(&mut self, stream: TcpStream) -> Result<()> {
        self.shared.counters.connected();
        self.shared.set_state(ListenerState::Connected);
        info!(endpoint = %self.config.endpoint, "connection established");
        self.log(&format!(
            "Connection made by {} to {}.",
            self.config.name, self.config.endpoint
        ));

        let codec = RecordCodec::new(self.config.shape.clone())
            .with_max_frame(self.config.max_frame_size);
        let mut framed = FramedRead::new(stream, codec);
        let poll_timeout: Duration = self.config.poll_timeout;

        loop {
            self.shared.set_state(ListenerState::Polling);
            let polled = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                polled = tokio::time::timeout(poll_timeout, framed.next()) => polled,
            };
            let Ok(next) = polled else {
                continue;
            };

            match next {
                None => return Err(TransportError::Closed.into()),
                Some(Err(err)) => return Err(err.into()),
                Some(Ok(record)) => {
                    self.shared.set_state(ListenerState::Reassembling);
                    self.delivery.deliver(record, &self.shared.counters)?;
                }
            }
        }
    }

    fn fail(&self, err: ListenerError) -> Result<()> {
        if self.cancel.is_cancelled() {
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
