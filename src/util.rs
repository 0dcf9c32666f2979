const RELAY_CONFIG: &str = "RELAY_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Configuration file path from the environment, falling back to `config.json`
pub fn get_config_path() -> String {
    let path_from_env = std::env::var(RELAY_CONFIG);
    path_from_env.unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

const RELAY_BACKEND_TOKEN: &str = "RELAY_BACKEND_TOKEN";

/// Backend bearer token from the environment; takes precedence over the config file
pub fn get_backend_token() -> Option<String> {
    let token_from_env = std::env::var(RELAY_BACKEND_TOKEN);
    token_from_env.ok().filter(|token| !token.is_empty())
}
