use std::fmt;
use std::path::PathBuf;

/// Failure of a single provider call made by a probe.
///
/// Always recovered locally: the task that hit it reports an empty record
/// list and the scan carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Credentials lack permission for the call
    PermissionDenied(String),

    /// Provider rejected the call due to rate limiting
    Throttled(String),

    /// Connect or read timeout on the provider call
    Timeout(String),

    /// Any other provider-side or transport failure
    Provider(String),

    /// Provider answered but the payload could not be understood
    MalformedResponse(String),

    /// The task running the probe died before producing a result
    Internal(String),
}

impl ProbeError {
    /// Classify a failed CLI invocation from its stderr text
    pub fn from_stderr(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("accessdenied")
            || lower.contains("access denied")
            || lower.contains("unauthorizedoperation")
            || lower.contains("not authorized")
            || lower.contains("unrecognizedclient")
            || lower.contains("expiredtoken")
        {
            ProbeError::PermissionDenied(message)
        } else if lower.contains("throttl")
            || lower.contains("toomanyrequests")
            || lower.contains("rate exceeded")
            || lower.contains("requestlimitexceeded")
        {
            ProbeError::Throttled(message)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ProbeError::Timeout(message)
        } else {
            ProbeError::Provider(message)
        }
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            ProbeError::PermissionDenied(_) => "permission denied",
            ProbeError::Throttled(_) => "throttled",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Provider(_) => "provider error",
            ProbeError::MalformedResponse(_) => "malformed response",
            ProbeError::Internal(_) => "internal error",
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::PermissionDenied(msg)
            | ProbeError::Throttled(msg)
            | ProbeError::Timeout(msg)
            | ProbeError::Provider(msg)
            | ProbeError::MalformedResponse(msg)
            | ProbeError::Internal(msg) => {
                write!(f, "{}: {}", self.label(), msg)
            }
        }
    }
}

impl std::error::Error for ProbeError {}

/// Cache store could not be read or written
#[derive(Debug)]
pub enum CacheError {
    /// Underlying store I/O failed
    Io { key: String, message: String },

    /// Stored entry exists but does not decode
    Corrupt { key: String, message: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io { key, message } => {
                write!(f, "cache I/O failed for entry {}: {}", key, message)
            }
            CacheError::Corrupt { key, message } => {
                write!(f, "cache entry {} is corrupt: {}", key, message)
            }
        }
    }
}

impl std::error::Error for CacheError {}

/// An IaC state document is missing or cannot be parsed
#[derive(Debug)]
pub enum StateParseError {
    /// No state document found at the given location
    Missing(PathBuf),

    /// The document could not be read
    Unreadable { path: PathBuf, message: String },

    /// The document is not a valid state document
    Malformed { path: PathBuf, message: String },

    /// `state pull` in a working directory failed
    PullFailed { dir: PathBuf, message: String },
}

impl fmt::Display for StateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateParseError::Missing(path) => {
                write!(f, "No state document found at {}", path.display())
            }
            StateParseError::Unreadable { path, message } => {
                write!(f, "Failed to read state document {}: {}", path.display(), message)
            }
            StateParseError::Malformed { path, message } => {
                write!(f, "Malformed state document {}: {}", path.display(), message)
            }
            StateParseError::PullFailed { dir, message } => {
                write!(f, "State pull failed in {}: {}", dir.display(), message)
            }
        }
    }
}

impl std::error::Error for StateParseError {}

/// Conditions that stop the process before any scanning starts
#[derive(Debug)]
pub enum SetupError {
    /// The provider CLI is not installed or not runnable
    CliUnavailable(String),

    /// No usable credentials for an account
    MissingCredentials { account: String, message: String },

    /// A required input file or directory does not exist
    MissingInput(PathBuf),

    /// Configuration is invalid
    InvalidConfig(String),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::CliUnavailable(msg) => {
                write!(f, "Provider CLI unavailable: {}", msg)
            }
            SetupError::MissingCredentials { account, message } => {
                write!(f, "No usable credentials for account {}: {}", account, message)
            }
            SetupError::MissingInput(path) => {
                write!(f, "Required input not found: {}", path.display())
            }
            SetupError::InvalidConfig(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for SetupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_classification() {
        assert!(matches!(
            ProbeError::from_stderr(
                "An error occurred (AccessDeniedException) when calling the ListFunctions operation"
            ),
            ProbeError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProbeError::from_stderr("An error occurred (ThrottlingException): Rate exceeded"),
            ProbeError::Throttled(_)
        ));
        assert!(matches!(
            ProbeError::from_stderr("Read timeout on endpoint URL"),
            ProbeError::Timeout(_)
        ));
        assert!(matches!(
            ProbeError::from_stderr("Could not connect to the endpoint URL"),
            ProbeError::Provider(_)
        ));
    }

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::Throttled("slow down".to_string());
        assert_eq!(err.to_string(), "throttled: slow down");
    }

    #[test]
    fn test_setup_error_display() {
        let err = SetupError::MissingInput(PathBuf::from("/tmp/missing.tfstate"));
        assert_eq!(
            err.to_string(),
            "Required input not found: /tmp/missing.tfstate"
        );
    }
}
