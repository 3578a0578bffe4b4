use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfMergeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Embed error: {0}")]
    EmbedError(String),

    #[error("Source document error: {0}")]
    SourceDocumentError(String),

    #[error("Unsupported input kind: {0}")]
    UnsupportedKindError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Conversion error: {0}")]
    ConversionError(String),

    #[error("Merge cancelled")]
    Cancelled,

    /// Failure attributed to one input, carrying its display name.
    #[error("{name}: {source}")]
    InputError {
        name: String,
        #[source]
        source: Box<PdfMergeError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`PdfMergeError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl PdfMergeError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a configuration error.
    config => ConfigError,
    /// Create a raster decode error.
    decode => DecodeError,
    /// Create an image embed error.
    embed => EmbedError,
    /// Create a source document error.
    source_document => SourceDocumentError,
    /// Create an unsupported kind error.
    unsupported_kind => UnsupportedKindError,
    /// Create an output encode error.
    encode => EncodeError,
    /// Create an external conversion error.
    conversion => ConversionError,
}

impl PdfMergeError {
    /// Attach the display name of the offending input.
    ///
    /// Already-attributed errors and cancellation pass through unchanged.
    pub fn for_input(self, name: impl Into<String>) -> Self {
        match self {
            Self::InputError { .. } | Self::Cancelled => self,
            other => Self::InputError {
                name: name.into(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the input this error is attributed to, if any.
    pub fn input_name(&self) -> Option<&str> {
        match self {
            Self::InputError { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<lopdf::Error> for PdfMergeError {
    fn from(e: lopdf::Error) -> Self {
        Self::SourceDocumentError(e.to_string())
    }
}

impl From<serde_yml::Error> for PdfMergeError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<image::ImageError> for PdfMergeError {
    fn from(e: image::ImageError) -> Self {
        Self::DecodeError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfMergeError>;
