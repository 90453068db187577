use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. Respects `RUST_LOG`; defaults to
/// `info,dcxmpp_core=debug,dcxmpp_net=debug`.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dcxmpp_core=debug,dcxmpp_net=debug")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
