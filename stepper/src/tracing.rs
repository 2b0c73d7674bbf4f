use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

/// Installs a plain-text subscriber filtered by `RUST_LOG`. Records emitted by
/// the trie engine through `log` are picked up as well.
pub fn init() {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();
}
