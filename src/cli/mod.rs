use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8001")]
    pub server_addr: String,

    /// Base URL of the inference server API (e.g., http://localhost:11434)
    #[arg(long, env = "LLM_BASE_URL", default_value = "http://localhost:11434")]
    pub llm_base_url: String,

    /// Model name requested from the inference server.
    #[arg(long, env = "LLM_MODEL_NAME", default_value = "gpt-oss:latest")]
    pub llm_model_name: String,

    /// Timeout in seconds applied to every inference server call.
    #[arg(long, env = "LLM_TIMEOUT", default_value = "300")]
    pub llm_timeout_secs: u64,

    /// Default sampling temperature used when a request does not set one.
    #[arg(long, env = "LLM_TEMPERATURE", default_value = "0.7")]
    pub llm_temperature: f32,

    /// Optional cap on generated tokens, attached to every model call when set.
    #[arg(long, env = "LLM_MAX_TOKENS")]
    pub llm_max_tokens: Option<u32>,
}
