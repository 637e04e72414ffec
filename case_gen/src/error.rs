use std::path::PathBuf;

pub type Result<T> = std::result::Result<T,Error>;

#[derive(Debug,thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    File(#[from] utils::Error),
    #[error("{case} line {line}: {message}")]
    Syntax {
        case:String,
        line:usize,
        message:String,
    },
    #[error("{case} [{section}]: {message}")]
    Field {
        case:String,
        section:String,
        message:String,
    },
    #[error("cannot parse yaml {path:?}: {source}")]
    Yaml {
        path:PathBuf,
        #[source]
        source:serde_yaml::Error,
    },
    #[error("job template {path:?}: {message}")]
    Template {
        path:PathBuf,
        message:String,
    },
    #[error("settings file {path:?} is corrupt: {source}")]
    Settings {
        path:PathBuf,
        #[source]
        source:toml::de::Error,
    },
    #[error("cannot serialize settings: {0}")]
    SettingsOut(#[from] toml::ser::Error),
    #[error("cannot read or write {path:?}: {source}")]
    Json {
        path:PathBuf,
        #[source]
        source:serde_json::Error,
    },
    #[error("case {case}: {path} is not listed among its file dependencies")]
    MissingDependency {
        case:String,
        path:String,
    },
}
