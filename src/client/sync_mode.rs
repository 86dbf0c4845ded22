//! How a document's local changes get pushed and the server's changes get
//! pulled (§4.5).

/// `PushPull` (default) exchanges in both directions every sync round;
/// `PushOnly` sends local changes without applying anything back;
/// `PullOnly` applies incoming changes without sending local ones.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncMode {
    PushPull,
    PushOnly,
    PullOnly,
}

impl Default for SyncMode {
    fn default() -> Self {
        SyncMode::PushPull
    }
}

/// Whether a document is kept converged opportunistically (`Manual`, the
/// caller decides when to call `sync`) or continuously (`Realtime`, every
/// local update and every watch-stream notification schedules one).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttachmentMode {
    Manual,
    Realtime,
}

impl Default for AttachmentMode {
    fn default() -> Self {
        AttachmentMode::Realtime
    }
}
