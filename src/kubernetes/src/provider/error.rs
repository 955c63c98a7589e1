use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cloud API call failed: {0}")]
    Api(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("capability not implemented: {0}")]
    NotImplemented(&'static str),
}
