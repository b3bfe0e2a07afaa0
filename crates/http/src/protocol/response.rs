use http::Response;

/// Status line and headers of a staged response.
///
/// The body travels separately as already serialized bytes, so the head is a
/// `http::Response<()>` handed to the header encoder.
pub type ResponseHead = Response<()>;
