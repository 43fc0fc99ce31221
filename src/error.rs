use crate::config::ConfigError;
use crate::pipeline::Stage;

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("credentials missing: {reason}; run `bigin auth login` to authenticate")]
    CredentialsMissing { reason: String },
    #[error("authorization callback not received within {waited_secs}s")]
    AuthTimeout { waited_secs: u64 },
    #[error("authorization was denied by the accounts server: {0}")]
    AuthorizationDenied(String),
    #[error("invalid stage `{stage}`; valid stages are: {}", Stage::valid_stage_list())]
    InvalidStage { stage: String },
    #[error("pipeline `{pipeline_id}` is already in terminal stage `{stage}`")]
    TerminalStage { pipeline_id: String, stage: String },
    #[error("invalid record filter `{0}`; expected <probability|amount>-<gt|ge|lt|le|eq>-<number>")]
    InvalidFilter(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("upstream request failed with status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("http transport failed: {0}")]
    Transport(String),
    #[error("failed to parse {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv {context} failed: {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CrmError {
    pub(crate) fn credentials_missing(reason: impl Into<String>) -> Self {
        Self::CredentialsMissing {
            reason: reason.into(),
        }
    }

    pub(crate) fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
