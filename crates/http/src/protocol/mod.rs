//! Core HTTP protocol types shared by the codec and the transport.
//!
//! - **Message Handling** ([`message`]): [`PayloadItem`] and [`PayloadSize`]
//! - **Request Processing** ([`request`]): [`RequestHeader`]
//! - **Response Processing** ([`response`]): [`ResponseHead`]
//! - **Error Handling** ([`error`]): [`ParseError`], [`SendError`]

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::ParseError;
pub use error::SendError;
