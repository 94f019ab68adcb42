//! Blocking client for the Moodle web-service REST API.
//!
//! # Overview
//! Turns typed calls on course and category handles into requests against
//! `{site}/webservice/rest/server.php`, using Moodle's indexed-array
//! parameter convention (`courses[0][fullname]`, `options[1][value]`, ...).
//! Read operations return decoded JSON, mutating operations the raw response.
//!
//! ```no_run
//! use muddle_core::{authenticate, Duplicate, OptionSet};
//!
//! let session = authenticate("token", "https://moodle.example.edu")?;
//! let _sections = session.course(10).contents()?;
//! let copy = Duplicate::new("Physics (copy)", "PHY-C", 3)
//!     .options(OptionSet::new().with("users", false));
//! session.course(10).duplicate(&copy)?;
//! session.category(5).delete(Some(2), true)?;
//! # Ok::<(), muddle_core::ApiError>(())
//! ```
//!
//! # Design
//! - `Session` is an owned, immutable context; handles borrow it.
//! - `router` decides the remote function and identifying params, `params`
//!   flattens them, and the session merges `wstoken` and the response format
//!   last so nothing can shadow them.
//! - Every operation has a `build_*` twin producing an `HttpRequest` value,
//!   so a host can do the I/O itself.

pub mod client;
pub mod error;
pub mod http;
pub mod options;
pub mod params;
pub mod router;
pub mod session;

pub use client::{Category, Course, Courses};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use options::OptionSet;
pub use params::{encode, IndexedList, ListItem, ParamMap, ParamValue};
pub use router::{route, Duplicate, Operation, Resource, RoutedCall};
pub use session::{authenticate, Session, SessionConfig};
