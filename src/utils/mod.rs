//! Input validation shared by the query model and the API layer.
//!
//! - [`ValidationError`]: every way a request parameter can be malformed
//! - [`parse_paper_identifier`]: parse `1811.00536v2`, `hep-th/9901001` and
//!   `arXiv:`-prefixed identifiers
//!
//! ```rust
//! use paper_search::utils::parse_paper_identifier;
//!
//! let id = parse_paper_identifier("arXiv:1811.00536v2").unwrap();
//! assert_eq!(id.paper_id, "1811.00536");
//! assert_eq!(id.version, Some(2));
//! ```

mod validate;

pub use validate::{parse_paper_identifier, PaperIdentifier, ValidationError};
