use error_stack::{Report, ResultExt};
use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::FormatTime, MakeWriter},
    layer::SubscriberExt,
    EnvFilter, Registry,
};

use crate::Error;

/// Set up tracing to the console. The filter is read from the `{env_prefix}LOG` environment
/// variable and defaults to `info`.
pub fn configure_tracing<FT, W>(
    env_prefix: &str,
    timer: FT,
    writer: W,
) -> Result<(), Report<Error>>
where
    FT: FormatTime + Send + Sync + 'static,
    for<'writer> W: MakeWriter<'writer> + Send + Sync + 'static,
{
    LogTracer::builder()
        .ignore_all(["rustls", "hyper", "sqlx::query"])
        .with_max_level(log::LevelFilter::Debug)
        .init()
        .change_context(Error::Tracing)?;

    let env_name = format!("{env_prefix}LOG");
    let env_filter = EnvFilter::try_from_env(&env_name).unwrap_or_else(|_| EnvFilter::new("info"));

    let formatter = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW)
        .with_timer(timer)
        .with_target(true)
        .with_writer(writer);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(formatter)
        .with(ErrorLayer::default());

    set_global_default(subscriber).change_context(Error::Tracing)?;

    Ok(())
}

/// Initialize tracing from a test context
#[cfg(test)]
pub mod test {
    use std::sync::Once;

    use tracing_subscriber::fmt::TestWriter;

    static TRACING: Once = Once::new();

    /// Initialize tracing. This only starts tracing once per process, so is safe to
    /// call from every test.
    pub fn init() {
        TRACING.call_once(|| {
            super::configure_tracing(
                "TEST_",
                tracing_subscriber::fmt::time::Uptime::default(),
                TestWriter::new(),
            )
            .expect("starting tracing");
        })
    }
}
