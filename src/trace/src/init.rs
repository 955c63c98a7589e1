use std::str::FromStr;

use tracing_subscriber::{prelude::*, Registry};

#[derive(Debug)]
pub struct TraceConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
            file: None,
        }
    }
}

pub async fn prepare_tracing(conf: TraceConfig) {
    let level = tracing_subscriber::filter::LevelFilter::from_str(&conf.level)
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    let json = conf.format == "json";

    match conf.file {
        Some(path) => {
            let file = std::fs::File::create(path).unwrap();
            if json {
                Registry::default()
                    .with(tracing_subscriber::fmt::Layer::new().with_writer(file).json())
                    .with(level)
                    .init();
            } else {
                Registry::default()
                    .with(tracing_subscriber::fmt::Layer::new().with_writer(file))
                    .with(level)
                    .init();
            }
        }
        None => {
            if json {
                Registry::default()
                    .with(tracing_subscriber::fmt::Layer::new().with_ansi(true).json())
                    .with(level)
                    .init();
            } else {
                Registry::default()
                    .with(tracing_subscriber::fmt::Layer::new().with_ansi(true))
                    .with(level)
                    .init();
            }
        }
    }
}
