use std::fmt::{Display, Formatter};

/// When a [`Provision`] implementation returns an error, it must explicitly state whether or not
/// infrastructure may have been left behind. The [`Coordinator`] uses this to decide whether a
/// failed apply still has to be followed by a destroy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Resources {
    /// Infrastructure was left behind and cannot be destroyed by the provisioner (for example
    /// the state was lost). Somebody has to clean up by hand.
    /// - The coordinator will **not** run `destroy`.
    Orphaned,

    /// Infrastructure was left behind and `Provision::destroy` should be able to remove it.
    /// - The coordinator **will** run `destroy`.
    Remaining,

    /// Something failed before any infrastructure was touched.
    /// - The coordinator will **not** run `destroy`.
    Clear,

    /// The provisioner cannot tell whether infrastructure was created.
    /// - The coordinator **will** run `destroy`.
    Unknown,
}

impl Resources {
    pub fn message(&self) -> &'static str {
        match self {
            Resources::Orphaned => "An error left orphaned infrastructure that cannot be destroyed",
            Resources::Remaining => "An error left infrastructure behind that can be destroyed",
            Resources::Clear => "An error occurred but no infrastructure was left behind",
            Resources::Unknown => {
                "An error occurred and it is unknown whether or not infrastructure was left behind"
            }
        }
    }

    /// Whether a destroy must follow an error carrying this value.
    pub fn needs_destroy(&self) -> bool {
        matches!(self, Resources::Remaining | Resources::Unknown)
    }
}

impl Display for Resources {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.message(), f)
    }
}

/// The error type returned by [`Provision`] implementations.
#[derive(Debug)]
pub struct ProviderError {
    /// Whether or not the error has left infrastructure behind.
    resources: Resources,

    /// Included in the formatted display before `inner`.
    context: Option<String>,

    /// The error that caused this error.
    inner: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

/// The result type returned by [`Provision`] operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    pub fn new_with_source_and_context<S, E>(resources: Resources, context: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            resources,
            context: Some(context.into()),
            inner: Some(source.into()),
        }
    }

    pub fn new_with_context<S>(resources: Resources, context: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            resources,
            context: Some(context.into()),
            inner: None,
        }
    }

    pub fn resources(&self) -> Resources {
        self.resources
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn inner(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.inner.as_ref().map(|some| some.as_ref())
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resources())?;
        if let Some(context) = self.context() {
            write!(f, ", {}", context)?;
        }
        if let Some(inner) = self.inner() {
            write!(f, ": {}", inner)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Converts foreign errors and empty options into a `ProviderError` with a familiar `context`
/// call, e.g. `output.context(Resources::Remaining, "Unable to read outputs")?`.
pub trait IntoProviderError<T> {
    fn context<S>(self, resources: Resources, message: S) -> ProviderResult<T>
    where
        S: Into<String>;
}

impl<T, E> IntoProviderError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<S>(self, resources: Resources, message: S) -> ProviderResult<T>
    where
        S: Into<String>,
    {
        self.map_err(|e| ProviderError::new_with_source_and_context(resources, message, e))
    }
}

impl<T> IntoProviderError<T> for std::option::Option<T> {
    fn context<S>(self, resources: Resources, message: S) -> ProviderResult<T>
    where
        S: Into<String>,
    {
        self.ok_or_else(|| ProviderError::new_with_context(resources, message))
    }
}
