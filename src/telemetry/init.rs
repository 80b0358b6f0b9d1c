// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log output for the CLI.
//!
//! Logs always go to stderr; stdout carries the streamed response. When
//! `RUST_LOG` is set it replaces the configured directive entirely.

use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// How log output is filtered and formatted.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Level for `switchyard` targets.
    pub level: Level,

    /// Level for everything else (reqwest, hyper, rusqlite).
    pub dependency_level: Level,

    /// File/line on every event and span open/close events.
    pub diagnostics: bool,

    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            dependency_level: Level::WARN,
            diagnostics: false,
            ansi: io::stderr().is_terminal(),
        }
    }
}

impl TelemetryConfig {
    /// Use the level named in configuration ("error" through "trace").
    ///
    /// Unknown names keep the current level. `"debug"` and `"trace"` also
    /// turn on diagnostics, which is what `--debug` relies on.
    pub fn with_level_name(mut self, name: &str) -> Self {
        if let Ok(level) = name.trim().parse::<Level>() {
            self.level = level;
            self.diagnostics = level >= Level::DEBUG;
        }
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        format!(
            "{},switchyard={}",
            self.dependency_level.to_string().to_lowercase(),
            self.level.to_string().to_lowercase()
        )
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }
}

/// Returned by [`init_telemetry`]; hold it until the program exits.
pub struct TelemetryGuard {
    _private: (),
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi)
        .with_target(config.diagnostics);

    let installed = if config.diagnostics {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(
                layer
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(layer.compact())
            .try_init()
    };
    installed.map_err(|e| io::Error::other(e.to_string()))?;

    Ok(TelemetryGuard { _private: () })
}
