// SPDX-License-Identifier: MPL-2.0
use std::fmt;

use crate::converter::ConverterError;
use crate::model::weights::WeightsError;
use crate::onnx::ExportError;
use crate::validate::ValidateError;

/// Top-level error for the export pipeline.
///
/// Each pipeline stage has its own error enum; this type folds them together
/// so callers can match on the stage that failed.
#[derive(Debug, Clone)]
pub enum Error {
    Io(String),
    Config(String),
    Weights(WeightsError),
    Export(ExportError),
    Validate(ValidateError),
    Converter(ConverterError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
            Error::Weights(e) => write!(f, "Weight Load Error: {}", e),
            Error::Export(e) => write!(f, "Export Error: {}", e),
            Error::Validate(e) => write!(f, "Validation Error: {}", e),
            Error::Converter(e) => write!(f, "Converter Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<WeightsError> for Error {
    fn from(err: WeightsError) -> Self {
        Error::Weights(err)
    }
}

impl From<ExportError> for Error {
    fn from(err: ExportError) -> Self {
        Error::Export(err)
    }
}

impl From<ValidateError> for Error {
    fn from(err: ValidateError) -> Self {
        Error::Validate(err)
    }
}

impl From<ConverterError> for Error {
    fn from(err: ConverterError) -> Self {
        Error::Converter(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
