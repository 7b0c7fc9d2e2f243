//! The `function@arg1@arg2...` format of call data, with hex-encoded
//! arguments.
use thiserror::Error;

const SEPARATOR: u8 = b'@';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallData {
    pub function:  String,
    pub arguments: Vec<Vec<u8>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallDataError {
    #[error("Call data is empty.")]
    Empty,
    #[error("Call data does not start with a function name.")]
    MissingFunction,
    #[error("Function name is not valid UTF-8.")]
    InvalidFunctionName,
    #[error("Argument {index} is not valid hex.")]
    InvalidArgument {
        index: usize,
    },
}

impl CallData {
    pub fn new(function: impl Into<String>, arguments: Vec<Vec<u8>>) -> Self {
        Self {
            function: function.into(),
            arguments,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, CallDataError> {
        if data.is_empty() {
            return Err(CallDataError::Empty);
        }
        let mut tokens = data.split(|&b| b == SEPARATOR);
        let function = tokens.next().unwrap_or_default();
        if function.is_empty() {
            return Err(CallDataError::MissingFunction);
        }
        let function =
            std::str::from_utf8(function).map_err(|_| CallDataError::InvalidFunctionName)?;
        let arguments = tokens
            .enumerate()
            .map(|(index, token)| {
                hex::decode(token).map_err(|_| CallDataError::InvalidArgument {
                    index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            function: function.to_string(),
            arguments,
        })
    }

    /// Length of the encoding, without producing it.
    pub fn encoded_len(&self) -> usize {
        self.arguments.iter().fold(self.function.len(), |acc, arg| acc + 1 + 2 * arg.len())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(self.function.as_bytes());
        for arg in self.arguments.iter() {
            out.push(SEPARATOR);
            out.extend_from_slice(hex::encode(arg).as_bytes());
        }
        out
    }
}
