//! Tracing initialisation runs in its own test binary because it installs a
//! process-wide subscriber.

use streamplt::tracing_init::{self, OutputFormat, TracingConfig};
use tracing::Level;

#[test]
fn init_is_idempotent() {
    let config = TracingConfig::new(Level::WARN)
        .with_format(OutputFormat::Compact)
        .with_ansi(false);

    assert!(tracing_init::init(config.clone()).is_ok());
    assert!(tracing_init::init(config).is_ok());
}
