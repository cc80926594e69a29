/// Initializes a [`tracing_subscriber`] that reads its filter from `RUST_LOG`.
///
/// Safe to call more than once.  Only the first call installs the subscriber, which matters in
/// tests where every case wants logs but only one subscriber may exist per process.
pub fn trace_init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
    {
        tracing::trace!("Loading Belated...");
    }
}
