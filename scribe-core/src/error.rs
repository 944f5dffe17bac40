use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::generative::ProviderError),

    #[error("Catalogue error: {0}")]
    Catalogue(String),
}
