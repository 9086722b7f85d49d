pub mod traits;
pub mod ophim;
pub mod error;

pub use traits::{CatalogSource, SortMode};
pub use ophim::OphimClient;
pub use error::SourceError;
