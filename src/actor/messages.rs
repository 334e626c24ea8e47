//! Actor Message Definitions
//!
//! ```text
//! AppContext --Watch--> FsActor --[ChangeEvent]--> SubscriberRegistry
//! ```

use tokio::sync::oneshot;

use crate::core::DocumentRef;

// =============================================================================
// FsActor Messages
// =============================================================================

/// Messages to the FileSystem Actor
#[derive(Debug)]
pub enum WatchMsg {
    /// Tear down the current watcher and watch `document` instead.
    ///
    /// The ack carries `false` when the tree could not be watched; the
    /// actor is then Uninitialized.
    Watch {
        document: DocumentRef,
        ack: oneshot::Sender<bool>,
    },
    /// Stop watching and end the actor
    Shutdown,
}
