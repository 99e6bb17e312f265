//! Deferred operator notices
//!
//! A [`DeferredNotice`] runs a background check that may produce a message,
//! holds that message while the foreground work runs, and releases it to the
//! logger only when [`DeferredNotice::flush`] is called. A message that has not
//! arrived by the time of the flush is dropped.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::logging::Logger;

pub struct DeferredNotice {
    release: Option<oneshot::Sender<()>>,
    printer: JoinHandle<()>,
}

impl DeferredNotice {
    /// Start `check` in the background; its message, if any, is buffered.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(check: F, logger: Arc<dyn Logger>) -> Self
    where
        F: Future<Output = Option<String>> + Send + 'static,
    {
        let (message_tx, message_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();

        tokio::spawn(async move {
            if let Some(message) = check.await {
                let _ = message_tx.send(message);
            }
        });

        let printer = tokio::spawn(wait_to_print(message_rx, release_rx, logger));

        Self {
            release: Some(release_tx),
            printer,
        }
    }

    /// Release the buffered message (if it has arrived) and wait for it to be logged.
    pub async fn flush(mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
        let _ = (&mut self.printer).await;
    }
}

/// Event loop over the two one-shot signals. Ends on the release signal, or
/// when the notice is dropped without flushing.
async fn wait_to_print(
    mut message: oneshot::Receiver<String>,
    mut release: oneshot::Receiver<()>,
    logger: Arc<dyn Logger>,
) {
    let mut buffered: Option<String> = None;
    let mut awaiting_message = true;

    loop {
        tokio::select! {
            biased;

            received = &mut message, if awaiting_message => {
                awaiting_message = false;
                buffered = received.ok();
            }
            released = &mut release => {
                if released.is_ok() {
                    if let Some(text) = buffered.as_deref() {
                        logger.info(text);
                    }
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RecordingLogger};
    use std::time::Duration;

    #[tokio::test]
    async fn test_message_is_held_until_flush() {
        let logger = Arc::new(RecordingLogger::new());
        let notice = DeferredNotice::spawn(
            async { Some("Runner exited while live".to_string()) },
            logger.clone(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(logger.entries().is_empty());

        notice.flush().await;
        assert_eq!(
            logger.messages(LogLevel::Info),
            vec!["Runner exited while live".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_message_logs_nothing() {
        let logger = Arc::new(RecordingLogger::new());
        let notice = DeferredNotice::spawn(async { None }, logger.clone());
        notice.flush().await;
        assert!(logger.entries().is_empty());
    }

    #[tokio::test]
    async fn test_late_message_is_dropped() {
        let logger = Arc::new(RecordingLogger::new());
        let notice = DeferredNotice::spawn(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Some("too late".to_string())
            },
            logger.clone(),
        );

        tokio::time::timeout(Duration::from_secs(1), notice.flush())
            .await
            .expect("flush must not wait for the check");
        assert!(logger.entries().is_empty());
    }
}
