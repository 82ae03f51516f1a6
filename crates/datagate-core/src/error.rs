//! Error types for gateway operations.

use std::fmt;

/// The primary error type for all datagate operations.
#[derive(Debug)]
pub enum Error {
    /// Failures reported by the connection, passed through untouched
    Connection(ConnectionError),
    /// Type registration and registry lookups
    Registration(RegistrationError),
    /// Query, operation and accessor lookups
    Lookup(LookupError),
    /// Supplied parameters do not match the template placeholders
    Binding(BindingError),
    /// Hydrated values of the wrong shape
    Hydration(HydrationError),
    /// A single-row fetch returned no row
    NotFound(NotFoundError),
    /// Malformed upsert/delete statements
    Statement(StatementError),
    /// Collection construction and access
    Collection(CollectionError),
    /// Value conversion errors
    Type(TypeError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost during operation
    Disconnected,
    /// The backend refused to prepare a statement
    Prepare,
    /// Statement execution failed
    Execute,
    /// Reading result rows failed
    Fetch,
}

#[derive(Debug, Clone)]
pub struct RegistrationError {
    pub kind: RegistrationErrorKind,
    /// Name of the domain type involved
    pub type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationErrorKind {
    /// The factory does not accept the type
    FactoryRejected,
    /// The query provider does not accept the type
    ProviderRejected,
    /// The type was registered before
    AlreadyRegistered,
    /// The type was never registered
    NotRegistered,
    /// No identity fields were given
    EmptyKeyFields,
}

#[derive(Debug, Clone)]
pub struct LookupError {
    pub kind: LookupErrorKind,
    /// Name of the domain type involved, if any
    pub type_name: Option<String>,
    /// The name that failed to resolve
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorKind {
    /// No template registered under the query key
    UnknownQuery,
    /// Operation name does not map to a query key
    UnknownOperation,
    /// A provider template map has an invalid shape
    MalformedQueryMap,
    /// The factory has no related-object accessor of that name
    UnknownAccessor,
}

#[derive(Debug, Clone)]
pub struct BindingError {
    pub sql: String,
    pub expected: usize,
    pub supplied: usize,
}

#[derive(Debug, Clone)]
pub struct HydrationError {
    pub kind: HydrationErrorKind,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationErrorKind {
    /// A factory built an object of another type
    WrongType,
    /// A collection factory produced something other than the requested collection
    NotACollection,
}

#[derive(Debug, Clone)]
pub struct NotFoundError {
    pub type_name: String,
    pub sql: String,
}

#[derive(Debug, Clone)]
pub struct StatementError {
    pub kind: StatementErrorKind,
    pub type_name: String,
    pub sql: String,
    /// The marker that was not found, for `MissingMarker`
    pub marker: Option<&'static str>,
    /// Fields the statement expects but were not supplied
    pub missing: Vec<String>,
    /// Fields supplied but absent from the statement
    pub unexpected: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementErrorKind {
    /// A required keyword is absent from the template
    MissingMarker,
    /// Template placeholders and bound fields differ
    KeysMismatch,
}

#[derive(Debug, Clone)]
pub struct CollectionError {
    pub kind: CollectionErrorKind,
    pub index: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionErrorKind {
    /// Input entry is not a field/value mapping
    NotARow,
    /// Rows and known objects differ in length
    LengthMismatch,
    /// A known or hydrated object has the wrong type
    WrongType,
    /// Index past the end
    OutOfRange,
    /// Any attempt to write or remove
    ReadOnly,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

impl Error {
    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Connection(c) => matches!(
                c.kind,
                ConnectionErrorKind::Connect | ConnectionErrorKind::Disconnected
            ),
            _ => false,
        }
    }

    /// Did a single-row fetch come back empty?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Binding(e) => Some(&e.sql),
            Error::NotFound(e) => Some(&e.sql),
            Error::Statement(e) => Some(&e.sql),
            _ => None,
        }
    }

    /// Shorthand for a `NotRegistered` registration error.
    pub fn not_registered(type_name: impl Into<String>) -> Self {
        Error::Registration(RegistrationError {
            kind: RegistrationErrorKind::NotRegistered,
            type_name: type_name.into(),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Registration(e) => write!(f, "Registration error: {}", e),
            Error::Lookup(e) => write!(f, "Lookup error: {}", e),
            Error::Binding(e) => write!(f, "Binding error: {}", e),
            Error::Hydration(e) => write!(f, "Hydration error: {}", e),
            Error::NotFound(e) => write!(f, "Not found: {}", e),
            Error::Statement(e) => write!(f, "Statement error: {}", e),
            Error::Collection(e) => write!(f, "Collection error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.type_name;
        match self.kind {
            RegistrationErrorKind::FactoryRejected => {
                write!(f, "factory does not accept type '{}'", t)
            }
            RegistrationErrorKind::ProviderRejected => {
                write!(f, "query provider does not accept type '{}'", t)
            }
            RegistrationErrorKind::AlreadyRegistered => {
                write!(f, "type '{}' is already registered", t)
            }
            RegistrationErrorKind::NotRegistered => write!(f, "type '{}' is not registered", t),
            RegistrationErrorKind::EmptyKeyFields => {
                write!(f, "type '{}' needs at least one key field", t)
            }
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_name {
            Some(t) => write!(f, "{} ('{}' on type '{}')", self.message, self.name, t),
            None => write!(f, "{} ('{}')", self.message, self.name),
        }
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} parameter(s), {} supplied for `{}`",
            self.expected, self.supplied, self.sql
        )
    }
}

impl fmt::Display for HydrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HydrationErrorKind::WrongType => write!(
                f,
                "expected an instance of {}, got {}",
                self.expected, self.actual
            ),
            HydrationErrorKind::NotACollection => write!(
                f,
                "expected a collection of {}, got {}",
                self.expected, self.actual
            ),
        }
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no {} row returned by `{}`", self.type_name, self.sql)
    }
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StatementErrorKind::MissingMarker => write!(
                f,
                "statement for '{}' lacks `{}`: `{}`",
                self.type_name,
                self.marker.unwrap_or("?"),
                self.sql
            ),
            StatementErrorKind::KeysMismatch => write!(
                f,
                "statement for '{}' does not match its fields (missing: [{}], unexpected: [{}])",
                self.type_name,
                self.missing.join(", "),
                self.unexpected.join(", ")
            ),
        }
    }
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} (index {})", self.message, i),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<RegistrationError> for Error {
    fn from(err: RegistrationError) -> Self {
        Error::Registration(err)
    }
}

impl From<LookupError> for Error {
    fn from(err: LookupError) -> Self {
        Error::Lookup(err)
    }
}

impl From<BindingError> for Error {
    fn from(err: BindingError) -> Self {
        Error::Binding(err)
    }
}

impl From<HydrationError> for Error {
    fn from(err: HydrationError) -> Self {
        Error::Hydration(err)
    }
}

impl From<NotFoundError> for Error {
    fn from(err: NotFoundError) -> Self {
        Error::NotFound(err)
    }
}

impl From<StatementError> for Error {
    fn from(err: StatementError) -> Self {
        Error::Statement(err)
    }
}

impl From<CollectionError> for Error {
    fn from(err: CollectionError) -> Self {
        Error::Collection(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for datagate operations.
pub type Result<T> = std::result::Result<T, Error>;
