//! Logging setup for programs that drive the solvers.
//!
//! The solvers only emit `tracing` events; nothing is printed unless a
//! subscriber is installed, either by the application or by the helpers here.

use tracing::Level;

/// Install a formatting subscriber at INFO (overridable via `RUST_LOG`).
///
/// # Example
/// ```no_run
/// use gradus_optim::{init_logger, Problem, SolverConfig};
///
/// init_logger();
/// let mut problem = Problem::new();
/// let x = problem.decision_variable();
/// problem.minimize(&x * &x);
/// problem.solve(&SolverConfig::default().with_diagnostics(true));
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Install a formatting subscriber with a custom default level.
///
/// Does nothing if a global subscriber is already set, so tests and
/// benchmarks can call it freely.
///
/// ```bash
/// RUST_LOG=gradus_optim=debug cargo test
/// ```
pub fn init_logger_with_level(default_level: Level) {
    // Fails only when a global subscriber is already installed, which is
    // the normal case for every call after the first.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .event_format(SolverFormatter)
        .try_init();
}

/// `[LEVEL target] message`, or `[LEVEL file:line] message` below INFO.
struct SolverFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for SolverFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();

        write!(writer, "[{:<5} ", level.as_str())?;
        match (level, metadata.file()) {
            (Level::DEBUG | Level::TRACE, Some(file)) => {
                let filename = file.rsplit('/').next().unwrap_or(file);
                write!(writer, "{filename}:{}", metadata.line().unwrap_or(0))?;
            }
            _ => write!(writer, "{}", metadata.target())?,
        }
        write!(writer, "] ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
