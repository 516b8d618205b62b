/// User-facing notice raised when an authenticated request fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub status: u16,
    pub message: String,
}

/// Sink for non-blocking failure notifications (toasts, status bars, logs).
///
/// Called from the request pipeline; implementations must not block.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        tracing::warn!(status = notice.status, message = %notice.message, "Request failed");
    }
}

/// Drops every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _notice: &Notice) {}
}
