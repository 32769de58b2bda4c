//! Bounded article queue between one generator and a server's connections.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::article::EncodedArticle;

/// Create a queue holding at most `capacity` encoded articles.
pub fn article_queue(capacity: usize) -> (ArticleProducer, ArticleConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ArticleProducer { tx },
        ArticleConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Sending half, owned by the generator. Runs on a blocking thread.
#[derive(Debug)]
pub struct ArticleProducer {
    tx: mpsc::Sender<EncodedArticle>,
}

impl ArticleProducer {
    /// Block until there is room, then enqueue. Gives the article back when
    /// every consumer is gone.
    pub fn push_blocking(&self, article: EncodedArticle) -> Result<(), EncodedArticle> {
        self.tx.blocking_send(article).map_err(|e| e.0)
    }

    /// True once every consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// No more articles. Consumers drain what is queued, then see `None`.
    pub fn finish(self) {
        drop(self.tx);
    }
}

/// Receiving half, cloned once per connection.
#[derive(Debug, Clone)]
pub struct ArticleConsumer {
    rx: Arc<Mutex<mpsc::Receiver<EncodedArticle>>>,
}

impl ArticleConsumer {
    /// Next article, or `None` once the producer finished and the queue is empty.
    pub async fn next(&self) -> Option<EncodedArticle> {
        self.rx.lock().await.recv().await
    }
}
