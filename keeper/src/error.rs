use std::fmt::Formatter;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing or invalid startup configuration.
    Config(String),
    /// Ledger unreachable or round state unparsable.
    Read(String),
    /// Proving capability unreachable or malformed output.
    Prover(String),
    /// Transport or signing failure while submitting.
    Submit(String),
    /// Ledger executed the call and rejected it.
    Rejected { digest: String, reason: String },
    /// Another trigger currently holds the trigger lock.
    InProgress,
    /// The round was advanced by someone else before this attempt ran.
    AlreadyAdvanced { expected: u64, current: Option<u64> },
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::Config(_) | Error::InProgress | Error::AlreadyAdvanced { .. }
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config error: {}", e),
            Error::Read(e) => write!(f, "failed to read round state: {}", e),
            Error::Prover(e) => write!(f, "vrf prover error: {}", e),
            Error::Submit(e) => write!(f, "failed to submit trigger: {}", e),
            Error::Rejected { digest, reason } => {
                write!(f, "trigger tx {} rejected on chain: {}", digest, reason)
            }
            Error::InProgress => write!(f, "a trigger is already in progress"),
            Error::AlreadyAdvanced { expected, current } => match current {
                Some(current) => write!(
                    f,
                    "round {} already advanced, ledger is at round {}",
                    expected, current
                ),
                None => write!(f, "round {} already closed, no active round", expected),
            },
        }
    }
}

impl std::error::Error for Error {}
