use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("FetchError::Transport: {0}")]
    Transport(String),
    #[error("FetchError::Status: provider responded with http status {0}")]
    Status(u16),
    #[error("FetchError::Parse: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(format!("json document error: {}", e))
    }
}
impl From<ureq::Error> for FetchError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(code) => FetchError::Status(code),
            e => FetchError::Transport(format!("http request error: {}", e)),
        }
    }
}
impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Transport(format!("io error: {}", e))
    }
}
