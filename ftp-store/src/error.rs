use suppaftp::FtpError;

/// Requested action not taken: file unavailable, no access, or not found.
const FILE_UNAVAILABLE: u32 = 550;
/// Requested action not taken: file name not allowed.
const NAME_NOT_ALLOWED: u32 = 553;
/// Syntax error, command not implemented, parameter not implemented.
const UNSUPPORTED: [u32; 3] = [500, 502, 504];

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no such file: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("authentication failed for {0}")]
    Authentication(String),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("ftp: {0}")]
    Ftp(#[from] FtpError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Classify an FTP error raised while operating on `path`.
    pub fn from_ftp(err: FtpError, path: &str) -> Self {
        let code = match &err {
            FtpError::UnexpectedResponse(response) => Some(response.status.code()),
            _ => None,
        };
        match code.and_then(|code| classify_code(code, path)) {
            Some(classified) => classified,
            None => StoreError::Ftp(err),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied(_))
    }

    /// Map a reply saying the command is not implemented to a denial.
    pub fn unsupported_as_denied(self, path: &str) -> Self {
        match self {
            StoreError::Ftp(FtpError::UnexpectedResponse(ref response))
                if UNSUPPORTED.contains(&response.status.code()) =>
            {
                StoreError::PermissionDenied(path.to_string())
            }
            other => other,
        }
    }
}

/// Reply codes with a meaning of their own. Anything else stays a protocol
/// error.
fn classify_code(code: u32, path: &str) -> Option<StoreError> {
    match code {
        FILE_UNAVAILABLE | NAME_NOT_ALLOWED => Some(StoreError::PermissionDenied(path.to_string())),
        _ => None,
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
