// Logging setup shared by the binaries
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,voxloop_core=info,voxloop_audio=info,voice_loop=info";

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
