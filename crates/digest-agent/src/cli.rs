use std::path::PathBuf;

use clap::Parser;

/// Summarize Azure DevOps work items with a local Ollama model.
///
/// Every option except `--config`, `--output` and `--skip-model-check` can
/// also be set through the environment variable shown in `--help`.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Organization URL, e.g. https://dev.azure.com/contoso
    #[arg(long, env = "ADO_URL")]
    pub ado_url: Option<String>,

    /// Project name
    #[arg(long, env = "ADO_PROJECT_NAME")]
    pub project: Option<String>,

    /// Personal access token; the Azure CLI login is used when unset
    #[arg(long, env = "ADO_PAT", hide_env_values = true)]
    pub pat: Option<String>,

    /// Comma-separated work item ids; non-numeric entries are ignored
    #[arg(long, env = "WORK_ITEM_IDS")]
    pub ids: Option<String>,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_HOST")]
    pub ollama_host: Option<String>,

    /// Ollama model name
    #[arg(long, env = "OLLAMA_MODEL")]
    pub model: Option<String>,

    /// Per-field character limit applied when building contexts
    #[arg(long, env = "SUMMARY_LENGTH")]
    pub field_limit: Option<usize>,

    /// TOML file with defaults for any of the above plus pipeline tunables
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where to write the markdown report
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Skip listing, pulling and warming up the model before the run
    #[arg(long, default_value_t = false)]
    pub skip_model_check: bool,
}
