/// Fatal conditions of an export run.
///
/// Anything that is not one of these (a malformed page, a record with missing fields) is handled
/// locally and never aborts the run.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// No API key could be found for a source that needs one.
    #[error(
        "missing API key for {source_name}: set SERPAPI_API_KEY (or API_KEY), or `api_key` under [serpapi] in the config file"
    )]
    MissingCredential { source_name: &'static str },
    /// The collaborator answered with an explicit error message.
    #[error("{source_name} error: {message}")]
    Collaborator {
        source_name: &'static str,
        message: String,
    },
    /// The collaborator answered with a non-success status and no usable error message.
    #[error("{source_name} returned HTTP {status} for {url}")]
    Http {
        source_name: &'static str,
        status: u16,
        url: String,
    },
}
