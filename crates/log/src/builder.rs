//! Subscriber construction

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{Config, Format};
use crate::{Error, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Apply the display options shared by every format and box the layer
macro_rules! boxed_fmt_layer {
    ($layer:expr, $config:expr, $writer:expr) => {{
        let layer = $layer
            .with_writer($writer)
            .with_ansi($config.ansi)
            .with_target($config.target)
            .with_file($config.source)
            .with_line_number($config.source);
        if $config.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| Error::Filter(format!("{}: {e}", self.config.level)))
    }

    fn writer(&self) -> BoxMakeWriter {
        if self.config.test_writer {
            BoxMakeWriter::new(TestWriter::new())
        } else {
            BoxMakeWriter::new(std::io::stderr)
        }
    }

    fn fmt_layer(&self) -> BoxedLayer {
        let config = &self.config;
        let writer = self.writer();
        match config.format {
            Format::Pretty => {
                boxed_fmt_layer!(tracing_subscriber::fmt::layer().pretty(), config, writer)
            }
            Format::Compact => {
                boxed_fmt_layer!(tracing_subscriber::fmt::layer().compact(), config, writer)
            }
            Format::Json => boxed_fmt_layer!(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .flatten_event(true),
                config,
                writer
            ),
        }
    }

    /// Build the subscriber and install it as the global default
    ///
    /// # Errors
    ///
    /// Returns error if the filter cannot be parsed or a global subscriber
    /// is already installed
    pub fn build(self) -> Result<()> {
        let filter = self.filter()?;
        Registry::default()
            .with(self.fmt_layer())
            .with(filter)
            .try_init()?;
        Ok(())
    }
}
