use std::path::PathBuf;

/// CLI configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local backend.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the conversion backend (default: `http://localhost:8000`).
    pub api_url: String,
    /// Directory where downloaded diagrams are written (default: `.`).
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                 |
    /// |----------------------|-------------------------|
    /// | `SOPFLOW_API_URL`    | `http://localhost:8000` |
    /// | `SOPFLOW_OUTPUT_DIR` | `.`                     |
    pub fn from_env() -> Self {
        let api_url = std::env::var("SOPFLOW_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into());

        let output_dir: PathBuf = std::env::var("SOPFLOW_OUTPUT_DIR")
            .unwrap_or_else(|_| ".".into())
            .into();

        Self {
            api_url,
            output_dir,
        }
    }
}
