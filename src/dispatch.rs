use crate::{Arrive, Blame};
use tokio::sync::mpsc;

/// The `Dispatch` trait is the one door into the update loop.
///
/// Anything that can take a message and queue it for the update function qualifies.  The contract
/// is narrow on purpose: `submit` must not block and must not run the update function itself.  It
/// only queues.  The update loop drains the queue on its own schedule, one message at a time.
///
/// Implementors are [`Clone`] because every scheduled loop walks off with its own copy, and
/// [`Send`] + [`Sync`] because those loops live on other tasks.
pub trait Dispatch<M>: Clone + Send + Sync + 'static {
    /// Queues `msg` for the update function.  Will [`Blame::Closed`] if the receiver is gone.
    fn submit(&self, msg: M) -> Arrive<()>;
}

impl<M: Send + 'static> Dispatch<M> for mpsc::UnboundedSender<M> {
    fn submit(&self, msg: M) -> Arrive<()> {
        self.send(msg).map_err(|_| Blame::Closed)
    }
}

/// The `Dispatcher` is the sending half of the channel created by [`channel`].
///
/// It wraps an unbounded [`mpsc::UnboundedSender`], so submission never waits on the receiver.
/// A bounded sender would make `submit` async, and the whole point is that the scheduled loops do
/// their waiting on the clock and nowhere else.
#[derive(Debug, derive_more::Deref)]
pub struct Dispatcher<M>(mpsc::UnboundedSender<M>);

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<M: Send + 'static> Dispatch<M> for Dispatcher<M> {
    fn submit(&self, msg: M) -> Arrive<()> {
        self.0.submit(msg)
    }
}

/// The `Inbox` is the receiving half of the channel created by [`channel`].  The update loop owns
/// it.
#[derive(Debug, derive_more::Deref, derive_more::DerefMut)]
pub struct Inbox<M>(mpsc::UnboundedReceiver<M>);

impl<M> Inbox<M> {
    /// Waits for the next message.  Returns `None` once every [`Dispatcher`] has been dropped.
    pub async fn recv(&mut self) -> Option<M> {
        self.0.recv().await
    }

    /// Takes a message if one is already waiting.
    pub fn try_recv(&mut self) -> Option<M> {
        self.0.try_recv().ok()
    }

    /// Empties whatever is currently queued.
    pub fn drain(&mut self) -> Vec<M> {
        let mut msgs = Vec::new();
        while let Some(msg) = self.try_recv() {
            msgs.push(msg);
        }
        msgs
    }
}

/// Creates a connected [`Dispatcher`] and [`Inbox`].
pub fn channel<M>() -> (Dispatcher<M>, Inbox<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher(tx), Inbox(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitted_messages_arrive_in_order() {
        let (tx, mut rx) = channel();
        for n in 0..5 {
            tx.submit(n).unwrap();
        }
        assert_eq!(rx.drain(), vec![0, 1, 2, 3, 4]);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn submit_after_inbox_dropped_is_closed() {
        let (tx, rx) = channel::<&str>();
        drop(rx);
        assert!(matches!(tx.submit("late"), Err(Blame::Closed)));
    }

    #[test]
    fn raw_sender_dispatches() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        Dispatch::submit(&tx, 'x').unwrap();
        assert_eq!(rx.try_recv().ok(), Some('x'));
    }

    #[tokio::test]
    async fn inbox_ends_when_dispatchers_drop() {
        let (tx, mut rx) = channel();
        let other = tx.clone();
        tx.submit(1).unwrap();
        other.submit(2).unwrap();
        drop(tx);
        drop(other);
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, None);
    }
}
