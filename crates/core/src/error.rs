use thiserror::Error;

/// Errors raised while decoding generator output into resources.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("output is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("YAML document {index} could not be decoded: {source}")]
    Yaml {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML document {index} is not a mapping")]
    NotAMapping { index: usize },
}
