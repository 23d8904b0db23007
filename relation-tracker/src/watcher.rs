//! [`NotifyWatcher`] over a tokio channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use relation_core::ApiError;

use crate::api::NotifyWatcher;

/// Yields one change per message received; stopping closes the channel so
/// the sending side sees `is_closed()`.
#[derive(Debug)]
pub struct ChannelWatcher {
    rx: mpsc::Receiver<()>,
    stopped: bool,
}

impl ChannelWatcher {
    pub fn new(rx: mpsc::Receiver<()>) -> Self {
        Self { rx, stopped: false }
    }

    pub fn channel(buffer: usize) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl NotifyWatcher for ChannelWatcher {
    async fn changed(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.rx.recv().await.is_some()
    }

    fn stop(&mut self) -> Result<(), ApiError> {
        if self.stopped {
            return Err(ApiError::WatcherStopped("already stopped".to_string()));
        }
        self.stopped = true;
        self.rx.close();
        Ok(())
    }
}
