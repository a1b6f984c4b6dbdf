/// Sink for human-visible session alerts. Injected into the supervisor so
/// tests can observe what would have reached the desktop.
pub(crate) trait Notifier: Send + Sync {
    fn push(&self, title: &str, body: &str);
}

/// Desktop notifications via the platform notification service. Delivery is
/// best-effort; a missing notification daemon must not break the sync loop.
pub(crate) struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn push(&self, title: &str, body: &str) {
        let mut notification = notify_rust::Notification::new();
        notification
            .appname("workon-issue")
            .summary(title)
            .body(body);
        #[cfg(all(unix, not(target_os = "macos")))]
        notification.urgency(notify_rust::Urgency::Critical);
        if let Err(err) = notification.show() {
            eprintln!("Warning: failed to deliver notification: {}", err);
        }
    }
}
