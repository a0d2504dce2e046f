use crate::debugger::buffer::BufferError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- command errors --------------------------------------------
    #[error("command parse error: {0}")]
    Parse(String),
    #[error("invalid or missing options")]
    InvalidOptions,
    #[error("unimplemented command `{0}`")]
    UnimplementedCommand(String),
    #[error("command is not available in the current run state")]
    CommandUnavailable,
    #[error("can not open file {0}")]
    CanNotOpenFile(String),

    // --------------------------------- breakpoint errors -----------------------------------------
    #[error("breakpoint type is not supported")]
    BreakpointType,
    #[error("invalid breakpoint")]
    BreakpointInvalid,
    #[error("invalid breakpoint state")]
    BreakpointState,
    #[error("no such breakpoint: {0}")]
    BreakpointNotFound(u32),

    // --------------------------------- inspection errors -----------------------------------------
    #[error("can not get property `{0}`")]
    UnknownProperty(String),
    #[error("stack depth {0} is invalid")]
    InvalidStackDepth(usize),
    #[error("invalid context")]
    InvalidContext,

    // --------------------------------- engine errors ---------------------------------------------
    #[error("internal error: {0}")]
    Internal(#[from] BufferError),
    #[error("not connected")]
    NotConnected,
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl Error {
    /// Error code sent in the `<error code="N"/>` element.
    pub fn code(&self) -> u32 {
        match self {
            Error::Parse(_) => 1,
            Error::InvalidOptions => 3,
            Error::UnimplementedCommand(_) => 4,
            Error::CommandUnavailable => 5,
            Error::CanNotOpenFile(_) => 100,
            Error::BreakpointType => 201,
            Error::BreakpointInvalid => 202,
            Error::BreakpointState => 204,
            Error::BreakpointNotFound(_) => 205,
            Error::UnknownProperty(_) => 300,
            Error::InvalidStackDepth(_) => 301,
            Error::InvalidContext => 302,
            Error::Internal(_) | Error::NotConnected | Error::ConnectionClosed | Error::IO(_) => {
                998
            }
        }
    }

    /// Return true if the session can not continue after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Parse(_) => false,
            Error::InvalidOptions => false,
            Error::UnimplementedCommand(_) => false,
            Error::CommandUnavailable => false,
            Error::CanNotOpenFile(_) => false,
            Error::BreakpointType => false,
            Error::BreakpointInvalid => false,
            Error::BreakpointState => false,
            Error::BreakpointNotFound(_) => false,
            Error::UnknownProperty(_) => false,
            Error::InvalidStackDepth(_) => false,
            Error::InvalidContext => false,
            Error::Internal(_) => false,

            // connection is unusable
            Error::NotConnected => true,
            Error::ConnectionClosed => true,
            Error::IO(_) => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "dbgp", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "dbgp", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
