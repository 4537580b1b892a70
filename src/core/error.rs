use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Unsupported,
    Transport,
    Timeout,
    Permission,
    NotFound,
    Remote,
    Cancelled,
}

impl ErrorKind {
    /// True for kinds produced from a decoded service response.
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            ErrorKind::Permission | ErrorKind::NotFound | ErrorKind::Remote
        )
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    status: Option<u16>,
    index: Option<String>,
    object_id: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            status: None,
            index: None,
            object_id: None,
            source: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled).with_message("request cancelled")
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(status) = self.status {
            write!(f, " (status: {status})")?;
        }
        if let Some(index) = &self.index {
            write!(f, " (index: {index})")?;
        }
        if let Some(object_id) = &self.object_id {
            write!(f, " (objectID: {object_id})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Permission => 4,
        ErrorKind::Transport => 5,
        ErrorKind::Timeout => 6,
        ErrorKind::Remote => 7,
        ErrorKind::Unsupported => 8,
        ErrorKind::Cancelled => 130,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::NotFound, 3),
            (ErrorKind::Permission, 4),
            (ErrorKind::Transport, 5),
            (ErrorKind::Timeout, 6),
            (ErrorKind::Remote, 7),
            (ErrorKind::Unsupported, 8),
            (ErrorKind::Cancelled, 130),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context_fields() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("ObjectID does not exist")
            .with_status(404)
            .with_index("products")
            .with_object_id("sku-1");
        assert_eq!(
            err.to_string(),
            "NotFound: ObjectID does not exist (status: 404) (index: products) (objectID: sku-1)"
        );
    }

    #[test]
    fn cancellation_is_not_a_remote_error() {
        assert!(!ErrorKind::Cancelled.is_remote());
        assert!(!ErrorKind::Transport.is_remote());
        assert!(!ErrorKind::Usage.is_remote());
        assert!(ErrorKind::NotFound.is_remote());
        assert!(ErrorKind::Remote.is_remote());
    }
}
