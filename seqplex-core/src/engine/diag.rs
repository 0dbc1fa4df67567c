//! Iteration diagnostics, gated by an environment variable.

/// Diagnostic logging configuration.
///
/// Set `SEQPLEX_DEBUG=1` to enable unconditional iteration logging, or
/// `SEQPLEX_DEBUG=<k>` to log every `k`-th iteration.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub every: usize,
}

impl DiagnosticsConfig {
    pub fn from_env() -> Self {
        match std::env::var("SEQPLEX_DEBUG") {
            Ok(v) => {
                let every = v.parse::<usize>().unwrap_or(1).max(1);
                Self {
                    enabled: true,
                    every,
                }
            }
            Err(_) => Self {
                enabled: false,
                every: 1,
            },
        }
    }

    pub fn should_log(&self, iter: usize) -> bool {
        self.enabled && iter % self.every == 0
    }
}
