use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DownloadEvent {
    #[serde(rename_all = "camelCase")]
    Started { song_id: String, name: String },
    #[serde(rename_all = "camelCase")]
    Succeeded {
        song_id: String,
        name: String,
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        song_id: String,
        name: String,
        message: String,
    },
}

impl DownloadEvent {
    pub fn song_id(&self) -> &str {
        match self {
            Self::Started { song_id, .. } | Self::Succeeded { song_id, .. } | Self::Failed { song_id, .. } => song_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started { .. })
    }
}

#[derive(Debug, Default)]
struct HubInner {
    subscribers: Vec<mpsc::UnboundedSender<DownloadEvent>>,
    pending: Vec<DownloadEvent>,
}

/// Fan-out of download notifications.
///
/// Events emitted while nobody listens are held and handed to the next
/// subscriber, then dropped.
#[derive(Debug, Default)]
pub struct EventHub {
    inner: Mutex<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DownloadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        g.subscribers.retain(|s| !s.is_closed());
        for ev in g.pending.drain(..) {
            let _ = tx.send(ev);
        }
        g.subscribers.push(tx);
        rx
    }

    pub fn emit(&self, ev: DownloadEvent) {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        g.subscribers.retain(|s| !s.is_closed());
        if g.subscribers.is_empty() {
            g.pending.push(ev);
            return;
        }
        for s in &g.subscribers {
            let _ = s.send(ev.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        g.subscribers.retain(|s| !s.is_closed());
        g.subscribers.len()
    }
}
