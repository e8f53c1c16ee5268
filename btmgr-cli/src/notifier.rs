use btmgr::Notifier;

/// Prints user-facing failures to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, title: &str, body: &str) {
        eprintln!("{title}: {}", body.replace('\n', " "));
    }
}
